//! Admin decision audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminActionType {
    Approve,
    Reject,
}

impl AdminActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminActionType::Approve => "approve",
            AdminActionType::Reject => "reject",
        }
    }
}

impl FromStr for AdminActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(AdminActionType::Approve),
            "reject" => Ok(AdminActionType::Reject),
            _ => Err(format!("Unknown admin action: {}", s)),
        }
    }
}

impl fmt::Display for AdminActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of an approval decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAction {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub target_user_id: Uuid,
    pub action: AdminActionType,
    pub reason: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdminAction {
    pub admin_id: Uuid,
    pub target_user_id: Uuid,
    pub action: AdminActionType,
    pub reason: Option<String>,
    pub metadata: JsonValue,
}
