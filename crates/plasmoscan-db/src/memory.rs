//! In-memory user repository for tests.
//!
//! Always compiled so integration tests in other crates can depend on it
//! without feature juggling.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use plasmoscan_core::{Error, Result, UserRecord, UserRepository};

/// HashMap-backed [`UserRepository`]. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing insert-time checks.
    pub async fn seed(&self, record: UserRecord) {
        self.users.write().await.insert(record.id, record);
    }

    /// Number of stored records.
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == record.email) {
            return Err(Error::EmailAlreadyInUse(record.email.clone()));
        }
        users.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.last_login = Some(at);
                Ok(())
            }
            None => Err(Error::Internal(format!("no such user: {id}"))),
        }
    }

    async fn set_biometric(&self, id: Uuid, template: &[u8]) -> Result<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.has_biometric_enrollment = true;
                user.biometric_template = Some(template.to_vec());
                Ok(())
            }
            None => Err(Error::Internal(format!("no such user: {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasmoscan_core::UserRole;

    fn record(email: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: "Tendai M.".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: UserRole::Doctor,
            has_biometric_enrollment: false,
            biometric_template: None,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = InMemoryUserRepository::new();
        let user = record("doc@clinic.example");
        repo.insert(&user).await.unwrap();

        assert_eq!(repo.count().await, 1);
        let by_email = repo
            .find_by_email("doc@clinic.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, user.email);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = InMemoryUserRepository::new();
        repo.insert(&record("doc@clinic.example")).await.unwrap();
        let err = repo.insert(&record("doc@clinic.example")).await.unwrap_err();
        assert!(matches!(err, Error::EmailAlreadyInUse(_)));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let repo = InMemoryUserRepository::new();
        let clone = repo.clone();
        repo.insert(&record("doc@clinic.example")).await.unwrap();
        assert_eq!(clone.count().await, 1);
    }

    #[tokio::test]
    async fn test_set_biometric_marks_enrollment() {
        let repo = InMemoryUserRepository::new();
        let user = record("doc@clinic.example");
        repo.insert(&user).await.unwrap();
        repo.set_biometric(user.id, &[7, 8]).await.unwrap();

        let found = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(found.has_biometric_enrollment);
        assert_eq!(found.biometric_template, Some(vec![7, 8]));
    }
}
