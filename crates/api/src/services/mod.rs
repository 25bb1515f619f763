//! Services used by the HTTP layer.

pub mod admin_bootstrap;
pub mod email;

pub use admin_bootstrap::bootstrap_admin;
pub use email::{EmailError, EmailMessage, EmailService};
