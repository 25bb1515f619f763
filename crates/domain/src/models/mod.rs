//! Domain models for rally registration.

pub mod admin_action;
pub mod catalog;
pub mod email_log;
pub mod rally;
pub mod registration;
pub mod user;

pub use admin_action::{AdminAction, AdminActionType, NewAdminAction};
pub use catalog::{CatalogEntryChanges, NewCatalogEntry, RallyEvent, RallyGame, RallyType};
pub use email_log::{EmailLog, EmailStatus, EmailType, NewEmailLog};
pub use rally::{
    derive_display_status, derive_temporal_status, DisplayStatus, NewRally, Rally,
    RallyCancellation, RallyEventSlot, RallyStatus, RallyUpdate, TemporalStatus,
};
pub use registration::{
    NewRegistration, RallyRegistration, RegistrationDetails, RegistrationStatus,
};
pub use user::{NewUser, User, UserRole, UserStats, UserStatus};
