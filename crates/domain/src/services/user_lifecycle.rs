//! User lifecycle: signup, email verification, admin approval and access.
//!
//! ```text
//! pending_email    --verify (not approved)--> pending_approval
//! pending_email    --verify (approved)------> approved
//! pending_email    --approve----------------> approved (email still unverified)
//! pending_approval --approve----------------> approved
//! pending_approval --reject-----------------> rejected
//! approved         --reject-----------------> rejected
//! ```
//!
//! `rejected` is terminal.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use shared::crypto::{generate_secure_token, sha256_hex};
use shared::pagination::{PageInfo, PageRequest};
use shared::password::{dummy_verify, hash_password, verify_password};
use shared::validation::{
    normalize_email, validate_display_name, validate_email_address, validate_password_strength,
};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    AdminAction, AdminActionType, EmailLog, NewAdminAction, NewUser, User, UserRole, UserStats,
    UserStatus,
};
use crate::services::clock::Clock;
use crate::services::notification::NotificationDispatcher;
use crate::stores::{EmailLogStore, UserStore};

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const MSG_EMAIL_TAKEN: &str = "Email already registered";
pub const MSG_USER_NOT_FOUND: &str = "User not found";
pub const MSG_REJECTED_NOT_APPROVABLE: &str = "Rejected users cannot be approved";
const MSG_DECISION_RACE: &str = "User changed while the decision was being recorded";

/// Status changes between reading a user and writing a decision are retried this often.
const MAX_DECISION_ATTEMPTS: usize = 3;

/// Default lifetime of an email verification token.
pub const DEFAULT_VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct UserLifecycleSettings {
    pub verification_token_ttl: Duration,
}

impl Default for UserLifecycleSettings {
    fn default() -> Self {
        Self {
            verification_token_ttl: Duration::hours(DEFAULT_VERIFICATION_TTL_HOURS),
        }
    }
}

/// Input for self-service signup.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Outcome of a signup.
#[derive(Debug, Clone)]
pub struct RegisteredUser {
    pub user: User,
    /// Whether the verification email was delivered.
    pub email_sent: bool,
}

#[derive(Clone)]
pub struct UserLifecycleService {
    users: Arc<dyn UserStore>,
    email_logs: Arc<dyn EmailLogStore>,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    settings: UserLifecycleSettings,
}

/// Whether `action` may be applied to the user as currently stored.
fn check_decision(user: &User, action: AdminActionType) -> DomainResult<()> {
    match (action, user.status) {
        (AdminActionType::Approve, UserStatus::Rejected) => {
            Err(DomainError::validation(MSG_REJECTED_NOT_APPROVABLE))
        }
        (AdminActionType::Approve, UserStatus::Approved) => {
            Err(DomainError::conflict("User is already approved"))
        }
        (AdminActionType::Reject, UserStatus::Rejected) => {
            Err(DomainError::conflict("User is already rejected"))
        }
        _ => Ok(()),
    }
}

fn validation_message(err: validator::ValidationError) -> DomainError {
    DomainError::Validation(
        err.message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string()),
    )
}

impl UserLifecycleService {
    pub fn new(
        users: Arc<dyn UserStore>,
        email_logs: Arc<dyn EmailLogStore>,
        notifications: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        settings: UserLifecycleSettings,
    ) -> Self {
        Self {
            users,
            email_logs,
            notifications,
            clock,
            settings,
        }
    }

    fn validate_credentials(email: &str, password: &str, name: &str) -> DomainResult<()> {
        validate_email_address(email).map_err(validation_message)?;
        validate_display_name(name).map_err(validation_message)?;
        validate_password_strength(password).map_err(validation_message)?;
        Ok(())
    }

    /// Creates a `pending_email` account and sends the verification email.
    ///
    /// A failed email does not undo the signup; it is reported through
    /// `email_sent` and the email log.
    pub async fn register(&self, input: Registration) -> DomainResult<RegisteredUser> {
        Self::validate_credentials(&input.email, &input.password, &input.name)?;
        let email = normalize_email(&input.email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict(MSG_EMAIL_TAKEN));
        }

        let password_hash = hash_password(&input.password)?;
        let token = generate_secure_token();
        let expires_at = self.clock.now() + self.settings.verification_token_ttl;

        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                name: input.name.trim().to_string(),
                role: UserRole::User,
                status: UserStatus::PendingEmail,
                email_verified: false,
                admin_approved: false,
                verification_token_hash: Some(sha256_hex(&token)),
                verification_expires_at: Some(expires_at),
            })
            .await
            .map_err(|e| match e {
                DomainError::Conflict(_) => DomainError::conflict(MSG_EMAIL_TAKEN),
                other => other,
            })?;

        tracing::info!(user_id = %user.id, "User registered");

        let email_sent = self.notifications.verification(&user, &token).await;
        Ok(RegisteredUser { user, email_sent })
    }

    /// Consumes a verification token.
    ///
    /// Returns `false` for unknown, expired or already used tokens without
    /// saying which.
    pub async fn verify_email(&self, token: &str) -> DomainResult<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(false);
        }
        let token_hash = sha256_hex(token);
        let now = self.clock.now();

        let Some(user) = self
            .users
            .find_by_verification_token(&token_hash, now)
            .await?
        else {
            tracing::debug!("Verification token not found or expired");
            return Ok(false);
        };

        match self
            .users
            .complete_email_verification(user.id, &token_hash)
            .await?
        {
            Some(updated) => {
                tracing::info!(user_id = %updated.id, status = %updated.status, "Email verified");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Issues a fresh token for an account still waiting on verification.
    ///
    /// Succeeds silently for unknown or already verified addresses.
    pub async fn resend_verification(&self, email: &str) -> DomainResult<()> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            return Ok(());
        };
        if user.email_verified || user.status != UserStatus::PendingEmail {
            return Ok(());
        }

        let token = generate_secure_token();
        let expires_at = self.clock.now() + self.settings.verification_token_ttl;
        self.users
            .replace_verification_token(user.id, &sha256_hex(&token), expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "Verification token reissued");
        self.notifications.verification(&user, &token).await;
        Ok(())
    }

    async fn load_subject(&self, user_id: Uuid) -> DomainResult<User> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_USER_NOT_FOUND))?;
        if user.is_admin() {
            return Err(DomainError::validation(
                "Admin accounts are not subject to approval",
            ));
        }
        Ok(user)
    }

    /// Writes an admin decision, re-reading the user whenever its status
    /// moved between the read and the write.
    ///
    /// Returns the updated user and the status it was decided from.
    async fn decide(
        &self,
        user_id: Uuid,
        admin_id: Uuid,
        action: AdminActionType,
        reason: Option<String>,
    ) -> DomainResult<(User, UserStatus)> {
        let (admin_approved, new_status) = match action {
            AdminActionType::Approve => (true, UserStatus::Approved),
            AdminActionType::Reject => (false, UserStatus::Rejected),
        };

        for _ in 0..MAX_DECISION_ATTEMPTS {
            let user = self.load_subject(user_id).await?;
            check_decision(&user, action)?;

            let record = NewAdminAction {
                admin_id,
                target_user_id: user.id,
                action,
                reason: reason.clone(),
                metadata: json!({
                    "previousStatus": user.status,
                    "newStatus": new_status,
                }),
            };
            if let Some(updated) = self
                .users
                .apply_admin_decision(user.id, user.status, admin_approved, new_status, record)
                .await?
            {
                return Ok((updated, user.status));
            }
            tracing::debug!(user_id = %user_id, "User status changed during decision, retrying");
        }
        Err(DomainError::conflict(MSG_DECISION_RACE))
    }

    /// Approves an account.
    ///
    /// Sets `approved` even when the email is still unverified.
    pub async fn approve_user(
        &self,
        user_id: Uuid,
        admin_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<User> {
        let (updated, previous) = self
            .decide(user_id, admin_id, AdminActionType::Approve, reason)
            .await?;

        tracing::info!(
            user_id = %updated.id,
            admin_id = %admin_id,
            previous_status = %previous,
            email_verified = updated.email_verified,
            "User approved"
        );

        self.notifications.approval(&updated).await;
        Ok(updated)
    }

    pub async fn reject_user(
        &self,
        user_id: Uuid,
        admin_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<User> {
        let (updated, previous) = self
            .decide(user_id, admin_id, AdminActionType::Reject, reason.clone())
            .await?;

        tracing::info!(
            user_id = %updated.id,
            admin_id = %admin_id,
            previous_status = %previous,
            "User rejected"
        );

        self.notifications
            .rejection(&updated, reason.as_deref())
            .await;
        Ok(updated)
    }

    /// Checks credentials and the access rule, then records the login.
    pub async fn authenticate(&self, email: &str, password: &str) -> DomainResult<User> {
        let email = normalize_email(email);
        let Some(mut user) = self.users.find_by_email(&email).await? else {
            dummy_verify(password);
            return Err(DomainError::Authentication(
                MSG_INVALID_CREDENTIALS.to_string(),
            ));
        };

        let valid = verify_password(password, &user.password_hash).unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "Stored password hash unusable");
            false
        });
        if !valid {
            return Err(DomainError::Authentication(
                MSG_INVALID_CREDENTIALS.to_string(),
            ));
        }

        if let Some(message) = user.access_denial() {
            tracing::info!(user_id = %user.id, status = %user.status, "Login refused");
            return Err(DomainError::Authorization(message.to_string()));
        }

        let now = self.clock.now();
        self.users.record_login(user.id, now).await?;
        user.last_login_at = Some(now);

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(user)
    }

    /// Re-applies the access rule for an already authenticated principal.
    pub async fn authorize(&self, user_id: Uuid) -> DomainResult<User> {
        let user = self.users.find_by_id(user_id).await?.ok_or_else(|| {
            DomainError::Authentication("Invalid or expired token".to_string())
        })?;
        if let Some(message) = user.access_denial() {
            return Err(DomainError::Authorization(message.to_string()));
        }
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> DomainResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_USER_NOT_FOUND))
    }

    pub async fn list_users(
        &self,
        status: Option<UserStatus>,
        page: PageRequest,
    ) -> DomainResult<(Vec<User>, PageInfo)> {
        let (users, total) = self.users.list(status, page).await?;
        Ok((users, PageInfo::new(page, total)))
    }

    pub async fn stats(&self) -> DomainResult<UserStats> {
        self.users.stats().await
    }

    pub async fn admin_actions(&self, user_id: Uuid) -> DomainResult<Vec<AdminAction>> {
        self.get_user(user_id).await?;
        self.users.admin_actions_for(user_id).await
    }

    pub async fn email_logs(&self, user_id: Uuid) -> DomainResult<Vec<EmailLog>> {
        self.get_user(user_id).await?;
        self.email_logs.list_for_user(user_id).await
    }

    /// Creates a verified, approved admin unless the email is already taken.
    ///
    /// Returns `None` when an account already exists for the email.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> DomainResult<Option<User>> {
        Self::validate_credentials(email, password, name)?;
        let email = normalize_email(email);

        if let Some(existing) = self.users.find_by_email(&email).await? {
            if !existing.is_admin() {
                tracing::warn!(
                    user_id = %existing.id,
                    "Bootstrap admin email belongs to a non-admin account"
                );
            }
            return Ok(None);
        }

        let user = self
            .users
            .create(NewUser {
                email,
                password_hash: hash_password(password)?,
                name: name.trim().to_string(),
                role: UserRole::Admin,
                status: UserStatus::Approved,
                email_verified: true,
                admin_approved: true,
                verification_token_hash: None,
                verification_expires_at: None,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Bootstrap admin created");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailStatus, EmailType};
    use crate::services::notification::RetryPolicy;
    use crate::testing::{ManualClock, InMemoryStore, RecordingNotifier};
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;

    const PASSWORD: &str = "Rally2024";

    struct Harness {
        service: UserLifecycleService,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(notifier: RecordingNotifier) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(notifier);
        let clock = Arc::new(ManualClock::default());
        let dispatcher =
            NotificationDispatcher::new(notifier.clone(), store.clone(), RetryPolicy::immediate(3));
        let service = UserLifecycleService::new(
            store.clone(),
            store.clone(),
            dispatcher,
            clock.clone(),
            UserLifecycleSettings::default(),
        );
        Harness {
            service,
            store,
            notifier,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingNotifier::new())
    }

    fn signup(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            name: Name().fake(),
        }
    }

    impl Harness {
        async fn register(&self, email: &str) -> (User, String) {
            let registered = self.service.register(signup(email)).await.unwrap();
            let token = self
                .notifier
                .last_token_for(&registered.user.email)
                .expect("verification token sent");
            (registered.user, token)
        }

        async fn admin(&self) -> User {
            self.service
                .bootstrap_admin("admin@example.com", "Adm1nPassword", "Admin")
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_full_signup_flow() {
        let h = harness();
        let admin = h.admin().await;

        let (user, token) = h.register("a@x.com").await;
        assert_eq!(user.status, UserStatus::PendingEmail);
        assert!(!user.email_verified);
        assert!(!user.admin_approved);

        assert!(h.service.verify_email(&token).await.unwrap());
        let verified = h.service.get_user(user.id).await.unwrap();
        assert_eq!(verified.status, UserStatus::PendingApproval);
        assert!(verified.email_verified);

        let approved = h.service.approve_user(user.id, admin.id, None).await.unwrap();
        assert_eq!(approved.status, UserStatus::Approved);
        assert!(approved.email_verified);
        assert!(approved.admin_approved);

        let logged_in = h.service.authenticate("A@X.com", PASSWORD).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_hashes_token() {
        let h = harness();
        let (user, token) = h.register("  Driver@Example.COM ").await;
        assert_eq!(user.email, "driver@example.com");
        assert_eq!(
            user.verification_token_hash.as_deref(),
            Some(sha256_hex(&token).as_str())
        );
        assert_ne!(user.verification_token_hash.as_deref(), Some(token.as_str()));
        assert_eq!(
            user.verification_expires_at,
            Some(h.clock.now() + Duration::hours(24))
        );
    }

    #[tokio::test]
    async fn test_register_duplicate_email_case_insensitive() {
        let h = harness();
        h.register("dup@example.com").await;
        let err = h
            .service
            .register(signup("DUP@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::conflict(MSG_EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let h = harness();
        let mut input = signup("weak@example.com");
        input.password = "password".to_string();
        let err = h.service.register(input).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email_and_blank_name() {
        let h = harness();
        let err = h.service.register(signup("nope")).await.unwrap_err();
        assert_eq!(err, DomainError::validation("Invalid email format"));

        let mut input = signup("ok@example.com");
        input.name = "  ".to_string();
        assert!(matches!(
            h.service.register(input).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_survives_email_failure() {
        let h = harness_with(RecordingNotifier::failing_times(u32::MAX));
        let email: String = SafeEmail().fake();
        let registered = h.service.register(signup(&email)).await.unwrap();

        assert!(!registered.email_sent);
        let logs = h.store.list_for_user(registered.user.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].email_type, EmailType::Verification);
        assert_eq!(logs[0].status, EmailStatus::Failed);
        assert_eq!(logs[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_verify_email_twice_is_idempotent() {
        let h = harness();
        let (user, token) = h.register("twice@example.com").await;

        assert!(h.service.verify_email(&token).await.unwrap());
        let after_first = h.service.get_user(user.id).await.unwrap();

        assert!(!h.service.verify_email(&token).await.unwrap());
        let after_second = h.service.get_user(user.id).await.unwrap();
        assert_eq!(after_first.status, after_second.status);
        assert_eq!(after_first.updated_at, after_second.updated_at);
    }

    #[tokio::test]
    async fn test_verify_email_expired_token() {
        let h = harness();
        let (user, token) = h.register("late@example.com").await;

        h.clock.advance(Duration::hours(24) + Duration::seconds(1));
        assert!(!h.service.verify_email(&token).await.unwrap());
        let unchanged = h.service.get_user(user.id).await.unwrap();
        assert_eq!(unchanged.status, UserStatus::PendingEmail);
    }

    #[tokio::test]
    async fn test_verify_email_unknown_token() {
        let h = harness();
        assert!(!h.service.verify_email("deadbeef").await.unwrap());
        assert!(!h.service.verify_email("").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_after_approval_goes_straight_to_approved() {
        let h = harness();
        let admin = h.admin().await;
        let (user, token) = h.register("early@example.com").await;

        h.service.approve_user(user.id, admin.id, None).await.unwrap();
        assert!(h.service.verify_email(&token).await.unwrap());

        let user = h.service.get_user(user.id).await.unwrap();
        assert_eq!(user.status, UserStatus::Approved);
        assert!(user.email_verified && user.admin_approved);
    }

    #[tokio::test]
    async fn test_approve_unverified_user_sets_approved() {
        let h = harness();
        let admin = h.admin().await;
        let (user, _) = h.register("quirk@example.com").await;

        let approved = h
            .service
            .approve_user(user.id, admin.id, Some("Known driver".into()))
            .await
            .unwrap();

        assert_eq!(approved.status, UserStatus::Approved);
        assert!(!approved.email_verified);
        assert!(approved.admin_approved);
        // Deliberately inconsistent with the flag derivation.
        assert_ne!(
            approved.status,
            UserStatus::derive(approved.email_verified, approved.admin_approved)
        );

        let actions = h.service.admin_actions(user.id).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, AdminActionType::Approve);
        assert_eq!(actions[0].admin_id, admin.id);
        assert_eq!(actions[0].reason.as_deref(), Some("Known driver"));
        assert_eq!(actions[0].metadata["previousStatus"], "pending_email");
        assert_eq!(actions[0].metadata["newStatus"], "approved");

        assert!(h
            .notifier
            .sent()
            .iter()
            .any(|n| n.email_type == EmailType::Approval && n.recipient == user.email));
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let h = harness();
        let admin = h.admin().await;
        let (user, token) = h.register("out@example.com").await;
        h.service.verify_email(&token).await.unwrap();

        let rejected = h
            .service
            .reject_user(user.id, admin.id, Some("Duplicate account".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, UserStatus::Rejected);
        assert!(!rejected.admin_approved);

        let err = h
            .service
            .approve_user(user.id, admin.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = h
            .service
            .reject_user(user.id, admin.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let sent = h.notifier.sent();
        let rejection = sent
            .iter()
            .find(|n| n.email_type == EmailType::Rejection)
            .unwrap();
        assert_eq!(rejection.reason.as_deref(), Some("Duplicate account"));
    }

    #[tokio::test]
    async fn test_verifying_rejected_user_keeps_rejected() {
        let h = harness();
        let admin = h.admin().await;
        let (user, token) = h.register("rej@example.com").await;

        h.service.reject_user(user.id, admin.id, None).await.unwrap();
        assert!(h.service.verify_email(&token).await.unwrap());

        let user = h.service.get_user(user.id).await.unwrap();
        assert_eq!(user.status, UserStatus::Rejected);
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn test_approve_unknown_user() {
        let h = harness();
        let admin = h.admin().await;
        let err = h
            .service
            .approve_user(Uuid::new_v4(), admin.id, None)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::not_found(MSG_USER_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_admin_accounts_not_subject_to_approval() {
        let h = harness();
        let admin = h.admin().await;
        assert!(matches!(
            h.service.reject_user(admin.id, admin.id, None).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_messages_by_priority() {
        let h = harness();
        let admin = h.admin().await;

        let (user, token) = h.register("prio@example.com").await;
        let err = h.service.authenticate(&user.email, PASSWORD).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::Authorization(
                "Please verify your email address before logging in".into()
            )
        );

        h.service.verify_email(&token).await.unwrap();
        let err = h.service.authenticate(&user.email, PASSWORD).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::Authorization("Your account is pending admin approval".into())
        );

        h.service.reject_user(user.id, admin.id, None).await.unwrap();
        let err = h.service.authenticate(&user.email, PASSWORD).await.unwrap_err();
        assert!(matches!(err, DomainError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_authenticate_does_not_reveal_unknown_email() {
        let h = harness();
        let (user, _) = h.register("known@example.com").await;

        let unknown = h
            .service
            .authenticate("ghost@example.com", PASSWORD)
            .await
            .unwrap_err();
        let wrong = h
            .service
            .authenticate(&user.email, "Wrong1234")
            .await
            .unwrap_err();

        assert_eq!(unknown, wrong);
        assert_eq!(
            unknown,
            DomainError::Authentication(MSG_INVALID_CREDENTIALS.into())
        );
    }

    #[tokio::test]
    async fn test_admin_bypasses_approval() {
        let h = harness();
        let admin = h.admin().await;
        let user = h
            .service
            .authenticate("admin@example.com", "Adm1nPassword")
            .await
            .unwrap();
        assert_eq!(user.id, admin.id);
        assert!(h.service.authorize(admin.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_authorize_reflects_later_rejection() {
        let h = harness();
        let admin = h.admin().await;
        let (user, token) = h.register("later@example.com").await;
        h.service.verify_email(&token).await.unwrap();
        h.service.approve_user(user.id, admin.id, None).await.unwrap();
        assert!(h.service.authorize(user.id).await.is_ok());

        h.service.reject_user(user.id, admin.id, None).await.unwrap();
        assert!(matches!(
            h.service.authorize(user.id).await,
            Err(DomainError::Authorization(_))
        ));
        assert!(matches!(
            h.service.authorize(Uuid::new_v4()).await,
            Err(DomainError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_resend_verification_replaces_token() {
        let h = harness();
        let (user, old_token) = h.register("resend@example.com").await;

        h.service.resend_verification("RESEND@example.com").await.unwrap();
        let new_token = h.notifier.last_token_for(&user.email).unwrap();
        assert_ne!(old_token, new_token);

        assert!(!h.service.verify_email(&old_token).await.unwrap());
        assert!(h.service.verify_email(&new_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_resend_verification_is_silent() {
        let h = harness();
        h.service
            .resend_verification("nobody@example.com")
            .await
            .unwrap();
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let h = harness();
        let first = h.admin().await;
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.status, UserStatus::Approved);

        let second = h
            .service
            .bootstrap_admin("ADMIN@example.com", "Adm1nPassword", "Admin")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_list_users_and_stats() {
        let h = harness();
        let admin = h.admin().await;
        let (a, _) = h.register("one@example.com").await;
        let (_b, token) = h.register("two@example.com").await;
        h.service.verify_email(&token).await.unwrap();
        h.service.reject_user(a.id, admin.id, None).await.unwrap();

        let stats = h.service.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.admins, 1);
        assert_eq!(stats.pending_approval, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.approved, 1);

        let (pending, info) = h
            .service
            .list_users(Some(UserStatus::PendingApproval), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].email, "two@example.com");
        assert_eq!(info.total, 1);
    }

    /// Commits a competing admin decision just before the next guarded write.
    struct InterleavedDecision {
        inner: Arc<InMemoryStore>,
        admin_id: Uuid,
        pending: std::sync::Mutex<Option<AdminActionType>>,
    }

    impl InterleavedDecision {
        fn new(inner: Arc<InMemoryStore>) -> Self {
            Self {
                inner,
                admin_id: Uuid::new_v4(),
                pending: std::sync::Mutex::new(None),
            }
        }

        fn arm(&self, action: AdminActionType) {
            *self.pending.lock().unwrap() = Some(action);
        }

        async fn interfere(&self, user_id: Uuid) {
            let Some(action) = self.pending.lock().unwrap().take() else {
                return;
            };
            let current = UserStore::find_by_id(self.inner.as_ref(), user_id)
                .await
                .unwrap()
                .unwrap();
            let (approved, status) = match action {
                AdminActionType::Approve => (true, UserStatus::Approved),
                AdminActionType::Reject => (false, UserStatus::Rejected),
            };
            let record = NewAdminAction {
                admin_id: self.admin_id,
                target_user_id: user_id,
                action,
                reason: Some("second moderator".into()),
                metadata: json!({}),
            };
            UserStore::apply_admin_decision(
                self.inner.as_ref(),
                user_id,
                current.status,
                approved,
                status,
                record,
            )
            .await
            .unwrap()
            .unwrap();
        }
    }

    #[async_trait::async_trait]
    impl UserStore for InterleavedDecision {
        async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
            UserStore::find_by_id(self.inner.as_ref(), id).await
        }

        async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
            UserStore::find_by_email(self.inner.as_ref(), email).await
        }

        async fn create(&self, user: NewUser) -> DomainResult<User> {
            UserStore::create(self.inner.as_ref(), user).await
        }

        async fn find_by_verification_token(
            &self,
            token_hash: &str,
            now: chrono::DateTime<chrono::Utc>,
        ) -> DomainResult<Option<User>> {
            UserStore::find_by_verification_token(self.inner.as_ref(), token_hash, now).await
        }

        async fn complete_email_verification(
            &self,
            user_id: Uuid,
            token_hash: &str,
        ) -> DomainResult<Option<User>> {
            self.interfere(user_id).await;
            UserStore::complete_email_verification(self.inner.as_ref(), user_id, token_hash).await
        }

        async fn apply_admin_decision(
            &self,
            user_id: Uuid,
            expected: UserStatus,
            admin_approved: bool,
            status: UserStatus,
            action: NewAdminAction,
        ) -> DomainResult<Option<User>> {
            self.interfere(user_id).await;
            UserStore::apply_admin_decision(
                self.inner.as_ref(),
                user_id,
                expected,
                admin_approved,
                status,
                action,
            )
            .await
        }

        async fn replace_verification_token(
            &self,
            user_id: Uuid,
            token_hash: &str,
            expires_at: chrono::DateTime<chrono::Utc>,
        ) -> DomainResult<()> {
            UserStore::replace_verification_token(
                self.inner.as_ref(),
                user_id,
                token_hash,
                expires_at,
            )
            .await
        }

        async fn record_login(
            &self,
            user_id: Uuid,
            at: chrono::DateTime<chrono::Utc>,
        ) -> DomainResult<()> {
            UserStore::record_login(self.inner.as_ref(), user_id, at).await
        }

        async fn list(
            &self,
            status: Option<UserStatus>,
            page: PageRequest,
        ) -> DomainResult<(Vec<User>, i64)> {
            UserStore::list(self.inner.as_ref(), status, page).await
        }

        async fn stats(&self) -> DomainResult<UserStats> {
            UserStore::stats(self.inner.as_ref()).await
        }

        async fn admin_actions_for(&self, target_user_id: Uuid) -> DomainResult<Vec<AdminAction>> {
            UserStore::admin_actions_for(self.inner.as_ref(), target_user_id).await
        }
    }

    fn interleaved_harness() -> (Harness, Arc<InterleavedDecision>) {
        let store = Arc::new(InMemoryStore::new());
        let users = Arc::new(InterleavedDecision::new(store.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let dispatcher =
            NotificationDispatcher::new(notifier.clone(), store.clone(), RetryPolicy::immediate(1));
        let service = UserLifecycleService::new(
            users.clone(),
            store.clone(),
            dispatcher,
            clock.clone(),
            UserLifecycleSettings::default(),
        );
        let harness = Harness {
            service,
            store,
            notifier,
            clock,
        };
        (harness, users)
    }

    #[tokio::test]
    async fn test_approve_loses_to_concurrent_reject() {
        let (h, users) = interleaved_harness();
        let admin = h.admin().await;
        let (user, token) = h.register("racer@example.com").await;
        assert!(h.service.verify_email(&token).await.unwrap());

        users.arm(AdminActionType::Reject);
        let err = h
            .service
            .approve_user(user.id, admin.id, None)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::validation(MSG_REJECTED_NOT_APPROVABLE));

        let stored = h.service.get_user(user.id).await.unwrap();
        assert_eq!(stored.status, UserStatus::Rejected);
        assert!(!stored.admin_approved);

        // Only the competing rejection was audited.
        let actions = h.service.admin_actions(user.id).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, AdminActionType::Reject);
        assert!(!h
            .notifier
            .sent()
            .iter()
            .any(|n| n.email_type == EmailType::Approval));
    }

    #[tokio::test]
    async fn test_verify_keeps_concurrent_rejection() {
        let (h, users) = interleaved_harness();
        h.admin().await;
        let (user, token) = h.register("racer@example.com").await;

        users.arm(AdminActionType::Reject);
        assert!(h.service.verify_email(&token).await.unwrap());

        let stored = h.service.get_user(user.id).await.unwrap();
        assert!(stored.email_verified);
        assert_eq!(stored.status, UserStatus::Rejected);
        assert!(stored.verification_token_hash.is_none());
    }

    #[tokio::test]
    async fn test_reject_retries_after_concurrent_approve() {
        let (h, users) = interleaved_harness();
        let admin = h.admin().await;
        let (user, token) = h.register("racer@example.com").await;
        assert!(h.service.verify_email(&token).await.unwrap());

        users.arm(AdminActionType::Approve);
        let rejected = h
            .service
            .reject_user(user.id, admin.id, Some("Cheating".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, UserStatus::Rejected);

        let actions = h.service.admin_actions(user.id).await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, AdminActionType::Reject);
        assert_eq!(actions[0].metadata["previousStatus"], "approved");
    }
}
