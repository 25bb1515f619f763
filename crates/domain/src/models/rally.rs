//! Rally domain model and temporal status derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stored rally status. Temporal state is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RallyStatus {
    Active,
    Cancelled,
}

impl RallyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RallyStatus::Active => "active",
            RallyStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RallyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RallyStatus::Active),
            "cancelled" => Ok(RallyStatus::Cancelled),
            _ => Err(format!("Invalid rally status: {}", s)),
        }
    }
}

impl fmt::Display for RallyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a rally stands relative to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalStatus {
    /// Registration is open.
    Upcoming,
    /// Registration closed, rally not yet run.
    Active,
    /// Rally date has passed.
    Past,
}

/// Status shown to clients: the temporal state, or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Upcoming,
    Active,
    Past,
    Cancelled,
}

impl DisplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStatus::Upcoming => "upcoming",
            DisplayStatus::Active => "active",
            DisplayStatus::Past => "past",
            DisplayStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for DisplayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(DisplayStatus::Upcoming),
            "active" => Ok(DisplayStatus::Active),
            "past" => Ok(DisplayStatus::Past),
            "cancelled" => Ok(DisplayStatus::Cancelled),
            _ => Err(format!("Invalid rally status: {}", s)),
        }
    }
}

impl From<TemporalStatus> for DisplayStatus {
    fn from(status: TemporalStatus) -> Self {
        match status {
            TemporalStatus::Upcoming => DisplayStatus::Upcoming,
            TemporalStatus::Active => DisplayStatus::Active,
            TemporalStatus::Past => DisplayStatus::Past,
        }
    }
}

/// An event slot within a rally, ordered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyEventSlot {
    pub event_id: Uuid,
    pub event_order: i32,
}

/// A scheduled rally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rally {
    pub id: Uuid,
    pub game_id: Uuid,
    pub type_id: Uuid,
    pub rally_date: DateTime<Utc>,
    pub registration_ending_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: RallyStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub events: Vec<RallyEventSlot>,
}

impl Rally {
    pub fn temporal_status(&self, now: DateTime<Utc>) -> TemporalStatus {
        derive_temporal_status(self, now)
    }

    pub fn display_status(&self, now: DateTime<Utc>) -> DisplayStatus {
        derive_display_status(self, now)
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.rally_date <= now
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RallyStatus::Cancelled
    }

    /// Whether the rally may still be edited or cancelled.
    pub fn is_mutable(&self, now: DateTime<Utc>) -> bool {
        !self.is_cancelled() && !self.is_past(now)
    }

    /// Whether a user may register right now.
    pub fn accepts_registrations(&self, now: DateTime<Utc>) -> bool {
        !self.is_cancelled() && self.temporal_status(now) == TemporalStatus::Upcoming
    }
}

/// Derives the temporal state of a rally.
///
/// `Past` once `rally_date <= now`, otherwise `Active` once
/// `registration_ending_date <= now`, otherwise `Upcoming`.
pub fn derive_temporal_status(rally: &Rally, now: DateTime<Utc>) -> TemporalStatus {
    if rally.rally_date <= now {
        TemporalStatus::Past
    } else if rally.registration_ending_date <= now {
        TemporalStatus::Active
    } else {
        TemporalStatus::Upcoming
    }
}

pub fn derive_display_status(rally: &Rally, now: DateTime<Utc>) -> DisplayStatus {
    if rally.is_cancelled() {
        DisplayStatus::Cancelled
    } else {
        rally.temporal_status(now).into()
    }
}

/// Validated data for inserting a rally with its events.
#[derive(Debug, Clone)]
pub struct NewRally {
    pub game_id: Uuid,
    pub type_id: Uuid,
    pub rally_date: DateTime<Utc>,
    pub registration_ending_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    /// In assignment order.
    pub event_ids: Vec<Uuid>,
}

/// Fully resolved values to write on update.
#[derive(Debug, Clone)]
pub struct RallyUpdate {
    pub rally_date: DateTime<Utc>,
    pub registration_ending_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// `Some` replaces the whole assignment set.
    pub event_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone)]
pub struct RallyCancellation {
    pub reason: Option<String>,
    pub cancelled_by: Uuid,
    pub cancelled_at: DateTime<Utc>,
}
