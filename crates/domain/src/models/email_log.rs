//! Notification delivery log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailType {
    Verification,
    Approval,
    Rejection,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Verification => "verification",
            EmailType::Approval => "approval",
            EmailType::Rejection => "rejection",
        }
    }
}

impl FromStr for EmailType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verification" => Ok(EmailType::Verification),
            "approval" => Ok(EmailType::Approval),
            "rejection" => Ok(EmailType::Rejection),
            _ => Err(format!("Unknown email type: {}", s)),
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
    Bounced,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
            EmailStatus::Bounced => "bounced",
        }
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sent" => Ok(EmailStatus::Sent),
            "failed" => Ok(EmailStatus::Failed),
            "bounced" => Ok(EmailStatus::Bounced),
            _ => Err(format!("Unknown email status: {}", s)),
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one notification, after all attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email_type: EmailType,
    pub recipient: String,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmailLog {
    pub user_id: Uuid,
    pub email_type: EmailType,
    pub recipient: String,
    pub status: EmailStatus,
    pub error_message: Option<String>,
    pub attempts: i32,
}
