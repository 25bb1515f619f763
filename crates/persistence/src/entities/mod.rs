//! Database entity definitions.
//!
//! Entities are direct mappings to database rows. Enum columns are stored
//! as text and parsed on conversion; an unknown value is a data error.

pub mod audit;
pub mod catalog;
pub mod rally;
pub mod registration;
pub mod user;

pub use audit::{AdminActionEntity, EmailLogEntity};
pub use catalog::{GameEntity, GameScopedEntity};
pub use rally::{RallyEntity, RallyEventAssignmentEntity};
pub use registration::RallyRegistrationEntity;
pub use user::{UserEntity, UserStatsEntity};

use domain::DomainError;
use std::str::FromStr;

/// Parses a text enum column.
pub(crate) fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T, DomainError> {
    T::from_str(value).map_err(DomainError::Database)
}
