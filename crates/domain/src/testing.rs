//! In-memory implementations of the domain ports, for tests.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for downstream crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use shared::pagination::PageRequest;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    AdminAction, CatalogEntryChanges, EmailLog, EmailType, NewAdminAction, NewCatalogEntry,
    NewEmailLog, NewRally, NewRegistration, NewUser, Rally, RallyCancellation, RallyEvent,
    RallyEventSlot, RallyGame, RallyRegistration, RallyStatus, RallyType, RallyUpdate,
    RegistrationDetails, RegistrationStatus, User, UserRole, UserStats, UserStatus,
};
use crate::services::clock::Clock;
use crate::services::notification::{Notifier, NotifyError};
use crate::stores::{
    CatalogStore, EmailLogStore, HealthProbe, RallyStore, RegistrationStore, UserStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unique_violation() -> DomainError {
    DomainError::Conflict("Resource already exists".to_string())
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    admin_actions: Vec<AdminAction>,
    email_logs: Vec<EmailLog>,
    games: Vec<RallyGame>,
    types: Vec<RallyType>,
    events: Vec<RallyEvent>,
    rallies: HashMap<Uuid, Rally>,
    registrations: Vec<RallyRegistration>,
}

impl State {
    /// A confirmed registration whose rally has not started at `now`.
    fn changeable_registration(
        &mut self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<&mut RallyRegistration> {
        let rallies = &self.rallies;
        self.registrations.iter_mut().find(|r| {
            r.id == id
                && !r.is_cancelled()
                && rallies.get(&r.rally_id).is_some_and(|rally| !rally.is_past(now))
        })
    }
}

/// Every store trait over one shared in-memory state.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

/// A `pending_email` user that is not stored anywhere.
pub fn sample_user(email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: String::new(),
        name: "Sample Driver".to_string(),
        role: UserRole::User,
        status: UserStatus::PendingEmail,
        email_verified: false,
        admin_approved: false,
        verification_token_hash: None,
        verification_expires_at: None,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> DomainResult<User> {
        let mut state = self.state();
        let email = user.email.to_lowercase();
        if state.users.iter().any(|u| u.email == email) {
            return Err(unique_violation());
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            status: user.status,
            email_verified: user.email_verified,
            admin_approved: user.admin_approved,
            verification_token_hash: user.verification_token_hash,
            verification_expires_at: user.verification_expires_at,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<User>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| {
                u.verification_token_hash.as_deref() == Some(token_hash)
                    && u.verification_expires_at.is_some_and(|exp| exp > now)
            })
            .cloned())
    }

    async fn complete_email_verification(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> DomainResult<Option<User>> {
        let mut state = self.state();
        let Some(user) = state.users.iter_mut().find(|u| {
            u.id == user_id && u.verification_token_hash.as_deref() == Some(token_hash)
        }) else {
            return Ok(None);
        };
        user.email_verified = true;
        user.verification_token_hash = None;
        user.verification_expires_at = None;
        user.status = user.reconciled_status();
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn apply_admin_decision(
        &self,
        user_id: Uuid,
        expected: UserStatus,
        admin_approved: bool,
        status: UserStatus,
        action: NewAdminAction,
    ) -> DomainResult<Option<User>> {
        let mut state = self.state();
        let now = Utc::now();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DomainError::not_found("User not found"))?;
        if user.status != expected {
            return Ok(None);
        }
        user.admin_approved = admin_approved;
        user.status = status;
        user.updated_at = now;
        let user = user.clone();

        state.admin_actions.push(AdminAction {
            id: Uuid::new_v4(),
            admin_id: action.admin_id,
            target_user_id: action.target_user_id,
            action: action.action,
            reason: action.reason,
            metadata: action.metadata,
            created_at: now,
        });
        Ok(Some(user))
    }

    async fn replace_verification_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut state = self.state();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.verification_token_hash = Some(token_hash.to_string());
            user.verification_expires_at = Some(expires_at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        let mut state = self.state();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn list(
        &self,
        status: Option<UserStatus>,
        page: PageRequest,
    ) -> DomainResult<(Vec<User>, i64)> {
        let state = self.state();
        let matching: Vec<&User> = state
            .users
            .iter()
            .rev()
            .filter(|u| status.map_or(true, |s| u.status == s))
            .collect();
        let total = matching.len() as i64;
        let users = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((users, total))
    }

    async fn stats(&self) -> DomainResult<UserStats> {
        let state = self.state();
        let count = |status: UserStatus| {
            state.users.iter().filter(|u| u.status == status).count() as i64
        };
        Ok(UserStats {
            total: state.users.len() as i64,
            pending_email: count(UserStatus::PendingEmail),
            pending_approval: count(UserStatus::PendingApproval),
            approved: count(UserStatus::Approved),
            rejected: count(UserStatus::Rejected),
            admins: state.users.iter().filter(|u| u.is_admin()).count() as i64,
        })
    }

    async fn admin_actions_for(&self, target_user_id: Uuid) -> DomainResult<Vec<AdminAction>> {
        Ok(self
            .state()
            .admin_actions
            .iter()
            .rev()
            .filter(|a| a.target_user_id == target_user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmailLogStore for InMemoryStore {
    async fn record(&self, entry: NewEmailLog) -> DomainResult<EmailLog> {
        let log = EmailLog {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            email_type: entry.email_type,
            recipient: entry.recipient,
            status: entry.status,
            error_message: entry.error_message,
            attempts: entry.attempts,
            created_at: Utc::now(),
        };
        self.state().email_logs.push(log.clone());
        Ok(log)
    }

    async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<EmailLog>> {
        Ok(self
            .state()
            .email_logs
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

macro_rules! apply_changes {
    ($row:expr, $changes:expr) => {{
        if let Some(name) = $changes.name {
            $row.name = name;
        }
        if let Some(description) = $changes.description {
            $row.description = Some(description);
        }
        if let Some(is_active) = $changes.is_active {
            $row.is_active = is_active;
        }
        $row.updated_at = Utc::now();
    }};
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_game(&self, entry: NewCatalogEntry) -> DomainResult<RallyGame> {
        let mut state = self.state();
        if state.games.iter().any(|g| same_name(&g.name, &entry.name)) {
            return Err(unique_violation());
        }
        let now = Utc::now();
        let game = RallyGame {
            id: Uuid::new_v4(),
            name: entry.name,
            description: entry.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.games.push(game.clone());
        Ok(game)
    }

    async fn find_game(&self, id: Uuid) -> DomainResult<Option<RallyGame>> {
        Ok(self.state().games.iter().find(|g| g.id == id).cloned())
    }

    async fn list_games(&self, active_only: bool) -> DomainResult<Vec<RallyGame>> {
        let mut games: Vec<RallyGame> = self
            .state()
            .games
            .iter()
            .filter(|g| !active_only || g.is_active)
            .cloned()
            .collect();
        games.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(games)
    }

    async fn update_game(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyGame>> {
        let mut state = self.state();
        if let Some(name) = &changes.name {
            if state
                .games
                .iter()
                .any(|g| g.id != id && same_name(&g.name, name))
            {
                return Err(unique_violation());
            }
        }
        let Some(game) = state.games.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        apply_changes!(game, changes);
        Ok(Some(game.clone()))
    }

    async fn delete_game(&self, id: Uuid) -> DomainResult<bool> {
        let mut state = self.state();
        if !state.games.iter().any(|g| g.id == id) {
            return Ok(false);
        }
        let in_use = state.types.iter().any(|t| t.game_id == id)
            || state.events.iter().any(|e| e.game_id == id)
            || state.rallies.values().any(|r| r.game_id == id);
        if in_use {
            return Err(DomainError::conflict(
                "Rally game is in use and cannot be deleted",
            ));
        }
        state.games.retain(|g| g.id != id);
        Ok(true)
    }

    async fn create_type(&self, game_id: Uuid, entry: NewCatalogEntry) -> DomainResult<RallyType> {
        let mut state = self.state();
        if !state.games.iter().any(|g| g.id == game_id) {
            return Err(DomainError::not_found("Referenced resource not found"));
        }
        if state
            .types
            .iter()
            .any(|t| t.game_id == game_id && same_name(&t.name, &entry.name))
        {
            return Err(unique_violation());
        }
        let now = Utc::now();
        let rally_type = RallyType {
            id: Uuid::new_v4(),
            game_id,
            name: entry.name,
            description: entry.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.types.push(rally_type.clone());
        Ok(rally_type)
    }

    async fn find_type(&self, id: Uuid) -> DomainResult<Option<RallyType>> {
        Ok(self.state().types.iter().find(|t| t.id == id).cloned())
    }

    async fn list_types(&self, game_id: Uuid, active_only: bool) -> DomainResult<Vec<RallyType>> {
        let mut types: Vec<RallyType> = self
            .state()
            .types
            .iter()
            .filter(|t| t.game_id == game_id && (!active_only || t.is_active))
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn update_type(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyType>> {
        let mut state = self.state();
        let Some(game_id) = state.types.iter().find(|t| t.id == id).map(|t| t.game_id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            if state
                .types
                .iter()
                .any(|t| t.id != id && t.game_id == game_id && same_name(&t.name, name))
            {
                return Err(unique_violation());
            }
        }
        let Some(rally_type) = state.types.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        apply_changes!(rally_type, changes);
        Ok(Some(rally_type.clone()))
    }

    async fn delete_type(&self, id: Uuid) -> DomainResult<bool> {
        let mut state = self.state();
        if !state.types.iter().any(|t| t.id == id) {
            return Ok(false);
        }
        if state.rallies.values().any(|r| r.type_id == id) {
            return Err(DomainError::conflict(
                "Rally type is used by existing rallies",
            ));
        }
        state.types.retain(|t| t.id != id);
        Ok(true)
    }

    async fn create_event(
        &self,
        game_id: Uuid,
        entry: NewCatalogEntry,
    ) -> DomainResult<RallyEvent> {
        let mut state = self.state();
        if !state.games.iter().any(|g| g.id == game_id) {
            return Err(DomainError::not_found("Referenced resource not found"));
        }
        if state
            .events
            .iter()
            .any(|e| e.game_id == game_id && same_name(&e.name, &entry.name))
        {
            return Err(unique_violation());
        }
        let now = Utc::now();
        let event = RallyEvent {
            id: Uuid::new_v4(),
            game_id,
            name: entry.name,
            description: entry.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn find_events(&self, ids: &[Uuid]) -> DomainResult<Vec<RallyEvent>> {
        Ok(self
            .state()
            .events
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn list_events(
        &self,
        game_id: Uuid,
        active_only: bool,
    ) -> DomainResult<Vec<RallyEvent>> {
        let mut events: Vec<RallyEvent> = self
            .state()
            .events
            .iter()
            .filter(|e| e.game_id == game_id && (!active_only || e.is_active))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(events)
    }

    async fn update_event(
        &self,
        id: Uuid,
        changes: CatalogEntryChanges,
    ) -> DomainResult<Option<RallyEvent>> {
        let mut state = self.state();
        let Some(game_id) = state.events.iter().find(|e| e.id == id).map(|e| e.game_id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            if state
                .events
                .iter()
                .any(|e| e.id != id && e.game_id == game_id && same_name(&e.name, name))
            {
                return Err(unique_violation());
            }
        }
        let Some(event) = state.events.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        apply_changes!(event, changes);
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> DomainResult<bool> {
        let mut state = self.state();
        if !state.events.iter().any(|e| e.id == id) {
            return Ok(false);
        }
        let in_use = state
            .rallies
            .values()
            .any(|r| r.events.iter().any(|slot| slot.event_id == id));
        if in_use {
            return Err(DomainError::conflict(
                "Rally event is used by existing rallies",
            ));
        }
        state.events.retain(|e| e.id != id);
        Ok(true)
    }
}

fn slots(event_ids: &[Uuid]) -> Vec<RallyEventSlot> {
    event_ids
        .iter()
        .zip(1..)
        .map(|(event_id, event_order)| RallyEventSlot {
            event_id: *event_id,
            event_order,
        })
        .collect()
}

#[async_trait]
impl RallyStore for InMemoryStore {
    async fn create(&self, rally: NewRally) -> DomainResult<Rally> {
        let now = Utc::now();
        let rally = Rally {
            id: Uuid::new_v4(),
            game_id: rally.game_id,
            type_id: rally.type_id,
            rally_date: rally.rally_date,
            registration_ending_date: rally.registration_ending_date,
            notes: rally.notes,
            status: RallyStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_by: rally.created_by,
            created_at: now,
            updated_at: now,
            events: slots(&rally.event_ids),
        };
        self.state().rallies.insert(rally.id, rally.clone());
        Ok(rally)
    }

    async fn find(&self, id: Uuid) -> DomainResult<Option<Rally>> {
        Ok(self.state().rallies.get(&id).cloned())
    }

    async fn list(&self, game_id: Option<Uuid>) -> DomainResult<Vec<Rally>> {
        let mut rallies: Vec<Rally> = self
            .state()
            .rallies
            .values()
            .filter(|r| game_id.map_or(true, |g| r.game_id == g))
            .cloned()
            .collect();
        rallies.sort_by_key(|r| (r.rally_date, r.created_at));
        Ok(rallies)
    }

    async fn update(
        &self,
        id: Uuid,
        update: RallyUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Rally>> {
        let mut state = self.state();
        let Some(rally) = state.rallies.get_mut(&id).filter(|r| r.is_mutable(now)) else {
            return Ok(None);
        };
        rally.rally_date = update.rally_date;
        rally.registration_ending_date = update.registration_ending_date;
        rally.notes = update.notes;
        if let Some(event_ids) = update.event_ids {
            rally.events = slots(&event_ids);
        }
        rally.updated_at = Utc::now();
        Ok(Some(rally.clone()))
    }

    async fn cancel(
        &self,
        id: Uuid,
        cancellation: RallyCancellation,
    ) -> DomainResult<Option<Rally>> {
        let mut state = self.state();
        let Some(rally) = state
            .rallies
            .get_mut(&id)
            .filter(|r| r.is_mutable(cancellation.cancelled_at))
        else {
            return Ok(None);
        };
        rally.status = RallyStatus::Cancelled;
        rally.cancellation_reason = cancellation.reason;
        rally.cancelled_by = Some(cancellation.cancelled_by);
        rally.cancelled_at = Some(cancellation.cancelled_at);
        rally.updated_at = Utc::now();
        Ok(Some(rally.clone()))
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn find(&self, id: Uuid) -> DomainResult<Option<RallyRegistration>> {
        Ok(self
            .state()
            .registrations
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_for_user_and_rally(
        &self,
        user_id: Uuid,
        rally_id: Uuid,
    ) -> DomainResult<Option<RallyRegistration>> {
        Ok(self
            .state()
            .registrations
            .iter()
            .find(|r| r.user_id == user_id && r.rally_id == rally_id)
            .cloned())
    }

    async fn create(&self, registration: NewRegistration) -> DomainResult<RallyRegistration> {
        let mut state = self.state();
        if state
            .registrations
            .iter()
            .any(|r| r.user_id == registration.user_id && r.rally_id == registration.rally_id)
        {
            return Err(unique_violation());
        }
        let now = Utc::now();
        let registration = RallyRegistration {
            id: Uuid::new_v4(),
            user_id: registration.user_id,
            rally_id: registration.rally_id,
            notes: registration.notes,
            car_setup: registration.car_setup,
            status: RegistrationStatus::Confirmed,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        state.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn update_details(
        &self,
        id: Uuid,
        details: RegistrationDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<RallyRegistration>> {
        let mut state = self.state();
        let Some(registration) = state.changeable_registration(id, now) else {
            return Ok(None);
        };
        registration.notes = details.notes;
        registration.car_setup = details.car_setup;
        registration.updated_at = Utc::now();
        Ok(Some(registration.clone()))
    }

    async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<RallyRegistration>> {
        let mut state = self.state();
        let Some(registration) = state.changeable_registration(id, at) else {
            return Ok(None);
        };
        registration.status = RegistrationStatus::Cancelled;
        registration.cancellation_reason = reason;
        registration.cancelled_at = Some(at);
        registration.updated_at = at;
        Ok(Some(registration.clone()))
    }

    async fn list_by_user(&self, user_id: Uuid) -> DomainResult<Vec<RallyRegistration>> {
        Ok(self
            .state()
            .registrations
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_rally(&self, rally_id: Uuid) -> DomainResult<Vec<RallyRegistration>> {
        Ok(self
            .state()
            .registrations
            .iter()
            .filter(|r| r.rally_id == rally_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthProbe for InMemoryStore {
    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub email_type: EmailType,
    pub recipient: String,
    pub name: String,
    pub token: Option<String>,
    pub reason: Option<String>,
}

/// Notifier that records deliveries and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failures_left: AtomicU32,
    bounce: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` sends with a delivery error.
    pub fn failing_times(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            ..Self::default()
        }
    }

    /// Rejects every recipient as undeliverable.
    pub fn bouncing() -> Self {
        Self {
            bounce: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        lock(&self.sent).clone()
    }

    /// Plain token from the most recent verification email to `recipient`.
    pub fn last_token_for(&self, recipient: &str) -> Option<String> {
        lock(&self.sent)
            .iter()
            .rev()
            .find(|n| n.email_type == EmailType::Verification && n.recipient == recipient)
            .and_then(|n| n.token.clone())
    }

    fn deliver(&self, notification: SentNotification) -> Result<(), NotifyError> {
        if self.bounce {
            return Err(NotifyError::Bounced(notification.recipient));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NotifyError::Delivery("Simulated failure".to_string()));
        }
        lock(&self.sent).push(notification);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification(
        &self,
        recipient: &str,
        name: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(SentNotification {
            email_type: EmailType::Verification,
            recipient: recipient.to_string(),
            name: name.to_string(),
            token: Some(token.to_string()),
            reason: None,
        })
    }

    async fn send_approval(&self, recipient: &str, name: &str) -> Result<(), NotifyError> {
        self.deliver(SentNotification {
            email_type: EmailType::Approval,
            recipient: recipient.to_string(),
            name: name.to_string(),
            token: None,
            reason: None,
        })
    }

    async fn send_rejection(
        &self,
        recipient: &str,
        name: &str,
        reason: Option<&str>,
    ) -> Result<(), NotifyError> {
        self.deliver(SentNotification {
            email_type: EmailType::Rejection,
            recipient: recipient.to_string(),
            name: name.to_string(),
            token: None,
            reason: reason.map(str::to_string),
        })
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Default for ManualClock {
    /// Starts at 2025-01-01T12:00:00Z.
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
