//! Persistence ports.
//!
//! Services depend on these traits; `persistence` implements them over
//! PostgreSQL and [`crate::testing`] over in-memory maps. Implementations
//! map unique violations to [`DomainError::Conflict`] and run multi-row
//! writes atomically.
//!
//! [`DomainError::Conflict`]: crate::DomainError::Conflict

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::pagination::PageRequest;
use uuid::Uuid;

use crate::error::DomainResult;
use crate::models::{
    AdminAction, CatalogEntryChanges, EmailLog, NewAdminAction, NewCatalogEntry, NewEmailLog,
    NewRally, NewRegistration, NewUser, Rally, RallyCancellation, RallyEvent, RallyGame,
    RallyRegistration, RallyType, RallyUpdate, RegistrationDetails, User, UserStats, UserStatus,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>>;

    /// Lookup by normalized (lowercased) email.
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;

    /// Inserts a user; a taken email yields `Conflict`.
    async fn create(&self, user: NewUser) -> DomainResult<User>;

    /// Finds the user holding an unexpired verification token hash.
    async fn find_by_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<User>>;

    /// Marks the email verified and clears the token, but only while the
    /// stored token hash still equals `token_hash`. The new status is
    /// computed from the stored row in the same write (see
    /// [`User::reconciled_status`]), so `Rejected` survives. Returns `None`
    /// when the token was already consumed or replaced.
    async fn complete_email_verification(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> DomainResult<Option<User>>;

    /// Writes an approval decision and its audit record in one transaction,
    /// provided the stored status still equals `expected`.
    ///
    /// Returns `None` when the status moved since it was read; an unknown
    /// user yields `NotFound`.
    async fn apply_admin_decision(
        &self,
        user_id: Uuid,
        expected: UserStatus,
        admin_approved: bool,
        status: UserStatus,
        action: NewAdminAction,
    ) -> DomainResult<Option<User>>;

    async fn replace_verification_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()>;

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    /// Page of users, newest first, with the total matching count.
    async fn list(
        &self,
        status: Option<UserStatus>,
        page: PageRequest,
    ) -> DomainResult<(Vec<User>, i64)>;

    async fn stats(&self) -> DomainResult<UserStats>;

    /// Decisions recorded against a user, newest first.
    async fn admin_actions_for(&self, target_user_id: Uuid) -> DomainResult<Vec<AdminAction>>;
}

#[async_trait]
pub trait EmailLogStore: Send + Sync {
    async fn record(&self, entry: NewEmailLog) -> DomainResult<EmailLog>;

    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<EmailLog>>;
}

/// Games, types and events.
///
/// Deleting a row still referenced elsewhere yields `Conflict`; delete and
/// update return `None`/`false` for unknown ids.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_game(&self, entry: NewCatalogEntry) -> DomainResult<RallyGame>;
    async fn find_game(&self, id: Uuid) -> DomainResult<Option<RallyGame>>;
    async fn list_games(&self, active_only: bool) -> DomainResult<Vec<RallyGame>>;
    async fn update_game(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyGame>>;
    async fn delete_game(&self, id: Uuid) -> DomainResult<bool>;

    async fn create_type(&self, game_id: Uuid, entry: NewCatalogEntry) -> DomainResult<RallyType>;
    async fn find_type(&self, id: Uuid) -> DomainResult<Option<RallyType>>;
    async fn list_types(&self, game_id: Uuid, active_only: bool) -> DomainResult<Vec<RallyType>>;
    async fn update_type(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyType>>;
    async fn delete_type(&self, id: Uuid) -> DomainResult<bool>;

    async fn create_event(
        &self,
        game_id: Uuid,
        entry: NewCatalogEntry,
    ) -> DomainResult<RallyEvent>;
    async fn find_events(&self, ids: &[Uuid]) -> DomainResult<Vec<RallyEvent>>;
    async fn list_events(&self, game_id: Uuid, active_only: bool)
        -> DomainResult<Vec<RallyEvent>>;
    async fn update_event(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyEvent>>;
    async fn delete_event(&self, id: Uuid) -> DomainResult<bool>;
}

#[async_trait]
pub trait RallyStore: Send + Sync {
    /// Inserts the rally and its event assignments in one transaction.
    async fn create(&self, rally: NewRally) -> DomainResult<Rally>;

    async fn find(&self, id: Uuid) -> DomainResult<Option<Rally>>;

    /// Ordered by rally date.
    async fn list(&self, game_id: Option<Uuid>) -> DomainResult<Vec<Rally>>;

    /// Writes the resolved fields; replaces assignments when `event_ids` is set.
    ///
    /// Applies only while the rally is active and `rally_date > now`;
    /// otherwise, or for an unknown id, returns `None`.
    async fn update(
        &self,
        id: Uuid,
        update: RallyUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Rally>>;

    /// Same guard as [`RallyStore::update`], with `cancelled_at` as the instant.
    async fn cancel(
        &self,
        id: Uuid,
        cancellation: RallyCancellation,
    ) -> DomainResult<Option<Rally>>;
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn find(&self, id: Uuid) -> DomainResult<Option<RallyRegistration>>;

    /// Any registration for the pair, whatever its status.
    async fn find_for_user_and_rally(
        &self,
        user_id: Uuid,
        rally_id: Uuid,
    ) -> DomainResult<Option<RallyRegistration>>;

    /// Inserts a confirmed registration; a second row for the pair yields `Conflict`.
    async fn create(&self, registration: NewRegistration) -> DomainResult<RallyRegistration>;

    /// Applies only to a confirmed registration whose rally date is after
    /// `now`; otherwise, or for an unknown id, returns `None`.
    async fn update_details(
        &self,
        id: Uuid,
        details: RegistrationDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<RallyRegistration>>;

    /// Same guard as [`RegistrationStore::update_details`], evaluated at `at`.
    async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<RallyRegistration>>;

    async fn list_by_user(&self, user_id: Uuid) -> DomainResult<Vec<RallyRegistration>>;

    async fn list_by_rally(&self, rally_id: Uuid) -> DomainResult<Vec<RallyRegistration>>;
}

/// Readiness check for the backing store.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> DomainResult<()>;
}
