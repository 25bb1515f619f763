//! Domain services for rally registration.
//!
//! Services hold the business rules and reach storage, notification and
//! time only through the traits they are constructed with.

pub mod catalog;
pub mod clock;
pub mod notification;
pub mod rally_lifecycle;
pub mod registration;
pub mod user_lifecycle;

pub use catalog::CatalogService;
pub use clock::{Clock, SystemClock};
pub use notification::{NotificationDispatcher, Notifier, NotifyError, RetryPolicy};
pub use rally_lifecycle::{CreateRally, RallyChanges, RallyFilter, RallyLifecycleService};
pub use registration::RegistrationService;
pub use user_lifecycle::{
    RegisteredUser, Registration, UserLifecycleService, UserLifecycleSettings,
};
