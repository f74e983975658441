//! User repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use plasmoscan_core::{Error, Result, UserRecord, UserRepository, UserRole};

/// Schema for the users table. Applied idempotently at startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    has_biometric_enrollment INTEGER NOT NULL DEFAULT 0,
    biometric_template BLOB,
    last_login TEXT,
    created_at TEXT NOT NULL
)
"#;

/// SQLite implementation of [`UserRepository`].
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a repository over an existing pool and ensure the schema
    /// exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        debug!(
            subsystem = "db",
            component = "users",
            op = "init",
            "User schema ready"
        );
        Ok(Self { pool })
    }

    fn record_from_row(row: &SqliteRow) -> Result<UserRecord> {
        let id: String = row.try_get("id")?;
        let id = Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("malformed user id in database: {e}")))?;

        let role: String = row.try_get("role")?;
        let role: UserRole = role.parse().map_err(Error::Internal)?;

        let created_at: String = row.try_get("created_at")?;
        let created_at = parse_timestamp(&created_at)?;

        let last_login: Option<String> = row.try_get("last_login")?;
        let last_login = last_login.as_deref().map(parse_timestamp).transpose()?;

        let has_biometric_enrollment: i64 = row.try_get("has_biometric_enrollment")?;

        Ok(UserRecord {
            id,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role,
            has_biometric_enrollment: has_biometric_enrollment != 0,
            biometric_template: row.try_get("biometric_template")?,
            last_login,
            created_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("malformed timestamp in database: {e}")))
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let result = sqlx::query(
            r#"INSERT INTO users (
                id, name, email, password_hash, role,
                has_biometric_enrollment, biometric_template, last_login, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(record.role.to_string())
        .bind(record.has_biometric_enrollment as i64)
        .bind(record.biometric_template.as_deref())
        .bind(record.last_login.map(|t| t.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::EmailAlreadyInUse(record.email.clone()))
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::Internal(format!("no such user: {id}")));
        }
        Ok(())
    }

    async fn set_biometric(&self, id: Uuid, template: &[u8]) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET has_biometric_enrollment = 1, biometric_template = ? WHERE id = ?",
        )
        .bind(template)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::Internal(format!("no such user: {id}")));
        }
        Ok(())
    }
}
