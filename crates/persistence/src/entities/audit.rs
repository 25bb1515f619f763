//! Audit log entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{AdminAction, EmailLog};
use domain::DomainError;
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use super::parse_column;

/// Row of the admin_actions table.
#[derive(Debug, Clone, FromRow)]
pub struct AdminActionEntity {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub target_user_id: Uuid,
    pub action: String,
    pub reason: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AdminActionEntity> for AdminAction {
    type Error = DomainError;

    fn try_from(entity: AdminActionEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            admin_id: entity.admin_id,
            target_user_id: entity.target_user_id,
            action: parse_column(&entity.action)?,
            reason: entity.reason,
            metadata: entity.metadata,
            created_at: entity.created_at,
        })
    }
}

/// Row of the email_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailLogEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email_type: String,
    pub recipient: String,
    pub status: String,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EmailLogEntity> for EmailLog {
    type Error = DomainError;

    fn try_from(entity: EmailLogEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            user_id: entity.user_id,
            email_type: parse_column(&entity.email_type)?,
            recipient: entity.recipient,
            status: parse_column(&entity.status)?,
            error_message: entity.error_message,
            attempts: entity.attempts,
            created_at: entity.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{AdminActionType, EmailStatus, EmailType};
    use serde_json::json;

    #[test]
    fn test_admin_action_conversion() {
        let action = AdminAction::try_from(AdminActionEntity {
            id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            target_user_id: Uuid::new_v4(),
            action: "reject".to_string(),
            reason: Some("spam".to_string()),
            metadata: json!({"previousStatus": "pending_approval"}),
            created_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(action.action, AdminActionType::Reject);
        assert_eq!(action.metadata["previousStatus"], "pending_approval");
    }

    #[test]
    fn test_email_log_conversion() {
        let log = EmailLog::try_from(EmailLogEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            email_type: "verification".to_string(),
            recipient: "driver@example.com".to_string(),
            status: "bounced".to_string(),
            error_message: Some("mailbox unavailable".to_string()),
            attempts: 1,
            created_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(log.email_type, EmailType::Verification);
        assert_eq!(log.status, EmailStatus::Bounced);
    }
}
