//! Session manager: authentication lifecycle and current-session ownership.
//!
//! State machine per process:
//!
//! ```text
//! Unauthenticated --login / biometric / resume--> Authenticated --logout--> Unauthenticated
//!        |
//!        +--register--> Pending-Enrollment --setup_biometric / skip--> Unauthenticated
//! ```
//!
//! Registration alone never authenticates; a subsequent login does. Login
//! is all-or-nothing with respect to session state: the session blob is
//! committed to the credential store before the in-memory session is set,
//! so a storage failure leaves the process unauthenticated.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use plasmoscan_core::{
    defaults, normalize_email, validate_display_name, validate_password, AppEvent,
    BiometricSample, BiometricVerifier, CredentialStore, Error, EventBus, PendingRegistration,
    RegistrationHandle, Result, Secret, Session, UserRecord, UserRepository, UserRole,
};

use crate::hash::{hash_password, verify_password};

/// Owns the authentication lifecycle and the current [`Session`].
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn BiometricVerifier>,
    events: EventBus,
    session: RwLock<Option<Session>>,
    pending: Mutex<Option<PendingRegistration>>,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn BiometricVerifier>,
        events: EventBus,
    ) -> Self {
        Self {
            users,
            store,
            verifier,
            events,
            session: RwLock::new(None),
            pending: Mutex::new(None),
        }
    }

    /// Subscribe to session state change events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// The current session, if authenticated.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Credential login.
    ///
    /// On mismatch (unknown email or wrong password) fails with
    /// `InvalidCredentials` and leaves all state untouched; repeated
    /// failures have no cumulative effect.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let start = Instant::now();
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(Error::InvalidInput("password must not be empty".to_string()));
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            debug!(
                subsystem = "auth",
                component = "session_manager",
                op = "login",
                success = false,
                "Credential mismatch"
            );
            return Err(Error::InvalidCredentials);
        }

        let session = self.commit_session(&user).await?;
        info!(
            subsystem = "auth",
            component = "session_manager",
            op = "login",
            user_id = %session.user_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Signed in with credentials"
        );
        Ok(session)
    }

    /// Biometric login. A no-match never creates a session.
    pub async fn login_with_biometric(&self, sample: &BiometricSample) -> Result<Session> {
        let user_id = self
            .verifier
            .identify(sample)
            .await?
            .ok_or(Error::BiometricNotRecognized)?;

        let user = match self.users.find_by_id(user_id).await? {
            Some(user) => user,
            None => {
                // The platform store knows a template the repository does
                // not; treat as no-match rather than leaking the mismatch.
                warn!(
                    subsystem = "auth",
                    component = "session_manager",
                    op = "login_biometric",
                    user_id = %user_id,
                    "Verifier matched an unknown user record"
                );
                return Err(Error::BiometricNotRecognized);
            }
        };

        let session = self.commit_session(&user).await?;
        info!(
            subsystem = "auth",
            component = "session_manager",
            op = "login_biometric",
            user_id = %session.user_id,
            "Signed in with biometrics"
        );
        Ok(session)
    }

    /// Create an account. Does not authenticate; leaves a pending
    /// registration so enrollment can follow without re-entering
    /// credentials.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<RegistrationHandle> {
        validate_display_name(name)?;
        let email = normalize_email(email)?;
        validate_password(password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(Error::EmailAlreadyInUse(email));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            role,
            has_biometric_enrollment: false,
            biometric_template: None,
            last_login: None,
            created_at: Utc::now(),
        };
        self.users.insert(&record).await?;

        let handle = RegistrationHandle {
            user_id: record.id,
            email: email.clone(),
            role,
        };

        *self.pending.lock().await = Some(PendingRegistration {
            user_id: record.id,
            email,
            password: Secret::new(password),
            role,
        });

        info!(
            subsystem = "auth",
            component = "session_manager",
            op = "register",
            user_id = %record.id,
            "Account created, enrollment pending"
        );
        Ok(handle)
    }

    /// Non-secret view of the pending registration, if any.
    pub async fn pending_registration(&self) -> Option<RegistrationHandle> {
        self.pending.lock().await.as_ref().map(|p| RegistrationHandle {
            user_id: p.user_id,
            email: p.email.clone(),
            role: p.role,
        })
    }

    /// Enroll a biometric template for the pending registration, or for the
    /// authenticated user (re-enrollment).
    ///
    /// On enrollment failure the pending registration is kept so the user
    /// can retry; it is erased only once consumed.
    pub async fn setup_biometric(&self, sample: &BiometricSample) -> Result<()> {
        let mut pending = self.pending.lock().await;

        let (user_id, from_pending) = if let Some(p) = pending.as_ref() {
            (p.user_id, true)
        } else if let Some(session) = self.session.read().await.as_ref() {
            (session.user_id, false)
        } else {
            return Err(Error::NoActiveRegistration);
        };

        let template = self.verifier.enroll(user_id, sample).await?;
        self.users.set_biometric(user_id, &template).await?;

        if from_pending {
            // Consume the bridge state; the Secret zeroizes on drop.
            *pending = None;
        }
        drop(pending);

        let mut session = self.session.write().await;
        if let Some(session) = session.as_mut() {
            if session.user_id == user_id {
                session.has_biometric_enrollment = true;
                if let Err(e) = self.persist_session(session).await {
                    // The enrollment itself committed; a stale stored blob
                    // only costs a flag until the next login.
                    warn!(
                        subsystem = "auth",
                        component = "session_manager",
                        op = "setup_biometric",
                        error = %e,
                        "Failed to refresh stored session after enrollment"
                    );
                }
            }
        }

        self.events.emit(AppEvent::BiometricEnrolled { user_id });
        info!(
            subsystem = "auth",
            component = "session_manager",
            op = "setup_biometric",
            user_id = %user_id,
            "Biometric enrollment complete"
        );
        Ok(())
    }

    /// Abandon the pending registration without enrolling. Idempotent.
    pub async fn skip_enrollment(&self) {
        let mut pending = self.pending.lock().await;
        if pending.take().is_some() {
            debug!(
                subsystem = "auth",
                component = "session_manager",
                op = "skip_enrollment",
                "Pending registration discarded"
            );
        }
    }

    /// Sign out. Idempotent: calling with no active session is a no-op.
    pub async fn logout(&self) {
        let previous = self.session.write().await.take();
        let Some(session) = previous else {
            return;
        };

        if let Err(e) = self.store.delete(defaults::SESSION_STORE_KEY).await {
            // Memory is already cleared; the stale blob will be overwritten
            // by the next login.
            warn!(
                subsystem = "auth",
                component = "session_manager",
                op = "logout",
                error = %e,
                "Failed to clear stored session"
            );
        }

        self.events.emit(AppEvent::SessionSignedOut {
            user_id: session.user_id,
        });
        info!(
            subsystem = "auth",
            component = "session_manager",
            op = "logout",
            user_id = %session.user_id,
            "Signed out"
        );
    }

    /// Rehydrate a persisted session at process start.
    ///
    /// Absent or corrupt stored data yields None; corrupt blobs are deleted
    /// and logged, never propagated.
    pub async fn resume_session(&self) -> Option<Session> {
        let blob = match self.store.get(defaults::SESSION_STORE_KEY).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    subsystem = "auth",
                    component = "session_manager",
                    op = "resume",
                    error = %e,
                    "Credential store unreadable, starting unauthenticated"
                );
                return None;
            }
        };

        let session: Session = match serde_json::from_slice(&blob) {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    subsystem = "auth",
                    component = "session_manager",
                    op = "resume",
                    error = %e,
                    "Stored session corrupt, clearing"
                );
                if let Err(e) = self.store.delete(defaults::SESSION_STORE_KEY).await {
                    warn!(
                        subsystem = "auth",
                        component = "session_manager",
                        op = "resume",
                        error = %e,
                        "Failed to clear corrupt session blob"
                    );
                }
                return None;
            }
        };

        *self.session.write().await = Some(session.clone());
        self.events.emit(AppEvent::SessionResumed {
            user_id: session.user_id,
        });
        info!(
            subsystem = "auth",
            component = "session_manager",
            op = "resume",
            user_id = %session.user_id,
            "Session resumed from store"
        );
        Some(session)
    }

    /// Record that first-run onboarding finished on this device.
    pub async fn mark_onboarding_complete(&self) -> Result<()> {
        self.store.put(defaults::ONBOARDING_STORE_KEY, b"1").await
    }

    /// Whether first-run onboarding has finished on this device.
    pub async fn is_onboarding_complete(&self) -> bool {
        matches!(
            self.store.get(defaults::ONBOARDING_STORE_KEY).await,
            Ok(Some(_))
        )
    }

    /// Build, persist, and install a session for a verified user.
    ///
    /// The store write happens first; if it fails no session exists
    /// anywhere. The last-login stamp is best-effort.
    async fn commit_session(&self, user: &UserRecord) -> Result<Session> {
        let session = Session::for_user(user);
        self.persist_session(&session).await?;

        if let Err(e) = self
            .users
            .update_last_login(user.id, session.logged_in_at)
            .await
        {
            warn!(
                subsystem = "auth",
                component = "session_manager",
                op = "login",
                user_id = %user.id,
                error = %e,
                "Failed to stamp last login"
            );
        }

        *self.session.write().await = Some(session.clone());
        self.events.emit(AppEvent::SessionSignedIn {
            user_id: session.user_id,
            role: session.role,
        });
        Ok(session)
    }

    async fn persist_session(&self, session: &Session) -> Result<()> {
        let blob = serde_json::to_vec(session)?;
        self.store.put(defaults::SESSION_STORE_KEY, &blob).await
    }
}
