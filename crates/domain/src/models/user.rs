//! User account domain models and status derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account status in the signup workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    PendingEmail,
    PendingApproval,
    Approved,
    Rejected,
}

impl UserStatus {
    /// Status implied by the verification and approval flags.
    ///
    /// `Rejected` is never derived; it is only set by an admin decision.
    pub fn derive(email_verified: bool, admin_approved: bool) -> Self {
        match (email_verified, admin_approved) {
            (false, _) => UserStatus::PendingEmail,
            (true, false) => UserStatus::PendingApproval,
            (true, true) => UserStatus::Approved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::PendingEmail => "pending_email",
            UserStatus::PendingApproval => "pending_approval",
            UserStatus::Approved => "approved",
            UserStatus::Rejected => "rejected",
        }
    }

    pub const ALL: [UserStatus; 4] = [
        UserStatus::PendingEmail,
        UserStatus::PendingApproval,
        UserStatus::Approved,
        UserStatus::Rejected,
    ];
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending_email" => Ok(UserStatus::PendingEmail),
            "pending_approval" => Ok(UserStatus::PendingApproval),
            "approved" => Ok(UserStatus::Approved),
            "rejected" => Ok(UserStatus::Rejected),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const MSG_EMAIL_NOT_VERIFIED: &str = "Please verify your email address before logging in";
pub const MSG_PENDING_APPROVAL: &str = "Your account is pending admin approval";
pub const MSG_REJECTED: &str = "Your account has been rejected";

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)] // Never serialize password hash to API responses
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub admin_approved: bool,
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Status after re-deriving from the flags, keeping `Rejected` sticky.
    pub fn reconciled_status(&self) -> UserStatus {
        if self.status == UserStatus::Rejected {
            UserStatus::Rejected
        } else {
            UserStatus::derive(self.email_verified, self.admin_approved)
        }
    }

    /// Reason this account may not use the application, if any.
    ///
    /// Admins always pass. For everyone else the first failing check wins:
    /// email verification, then admin approval, then rejection.
    pub fn access_denial(&self) -> Option<&'static str> {
        if self.is_admin() || self.status == UserStatus::Approved {
            return None;
        }
        if !self.email_verified {
            Some(MSG_EMAIL_NOT_VERIFIED)
        } else if !self.admin_approved {
            Some(MSG_PENDING_APPROVAL)
        } else if self.status == UserStatus::Rejected {
            Some(MSG_REJECTED)
        } else {
            Some(MSG_PENDING_APPROVAL)
        }
    }
}

/// Data required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub admin_approved: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

/// Account counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub pending_email: i64,
    pub pending_approval: i64,
    pub approved: i64,
    pub rejected: i64,
    pub admins: i64,
}
