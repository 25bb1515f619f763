//! Account notifications.
//!
//! Lifecycle services never fail because an email could not be delivered.
//! They go through [`NotificationDispatcher`], which retries a bounded number
//! of times and then appends the outcome to the email log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EmailStatus, EmailType, NewEmailLog, User};
use crate::stores::EmailLogStore;

/// Error returned by a notifier transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The recipient address is permanently undeliverable.
    #[error("Recipient rejected: {0}")]
    Bounced(String),
}

/// Outbound account notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the email verification link built from the plain token.
    async fn send_verification(
        &self,
        recipient: &str,
        name: &str,
        token: &str,
    ) -> Result<(), NotifyError>;

    async fn send_approval(&self, recipient: &str, name: &str) -> Result<(), NotifyError>;

    async fn send_rejection(
        &self,
        recipient: &str,
        name: &str,
        reason: Option<&str>,
    ) -> Result<(), NotifyError>;
}

/// Retry settings for notification delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after each failure.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
        }
    }
}

enum Message<'a> {
    Verification { token: &'a str },
    Approval,
    Rejection { reason: Option<&'a str> },
}

impl Message<'_> {
    fn email_type(&self) -> EmailType {
        match self {
            Message::Verification { .. } => EmailType::Verification,
            Message::Approval => EmailType::Approval,
            Message::Rejection { .. } => EmailType::Rejection,
        }
    }
}

/// Delivers notifications with bounded retry and records each outcome.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    email_logs: Arc<dyn EmailLogStore>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        email_logs: Arc<dyn EmailLogStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            notifier,
            email_logs,
            policy,
        }
    }

    /// Returns whether the verification email went out.
    pub async fn verification(&self, user: &User, token: &str) -> bool {
        self.dispatch(user, Message::Verification { token }).await
    }

    pub async fn approval(&self, user: &User) -> bool {
        self.dispatch(user, Message::Approval).await
    }

    pub async fn rejection(&self, user: &User, reason: Option<&str>) -> bool {
        self.dispatch(user, Message::Rejection { reason }).await
    }

    async fn send_once(&self, user: &User, message: &Message<'_>) -> Result<(), NotifyError> {
        match message {
            Message::Verification { token } => {
                self.notifier
                    .send_verification(&user.email, &user.name, token)
                    .await
            }
            Message::Approval => self.notifier.send_approval(&user.email, &user.name).await,
            Message::Rejection { reason } => {
                self.notifier
                    .send_rejection(&user.email, &user.name, *reason)
                    .await
            }
        }
    }

    async fn dispatch(&self, user: &User, message: Message<'_>) -> bool {
        let email_type = message.email_type();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.initial_backoff;
        let mut attempts = 0;
        let mut last_error: Option<NotifyError> = None;

        while attempts < max_attempts {
            attempts += 1;
            match self.send_once(user, &message).await {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(err) => {
                    tracing::warn!(
                        user_id = %user.id,
                        email_type = %email_type,
                        attempt = attempts,
                        error = %err,
                        "Notification attempt failed"
                    );
                    let permanent = matches!(err, NotifyError::Bounced(_));
                    last_error = Some(err);
                    if permanent || attempts >= max_attempts {
                        break;
                    }
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    backoff *= 2;
                }
            }
        }

        let (status, error_message) = match &last_error {
            None => (EmailStatus::Sent, None),
            Some(NotifyError::Bounced(msg)) => (EmailStatus::Bounced, Some(msg.clone())),
            Some(err) => (EmailStatus::Failed, Some(err.to_string())),
        };

        if status == EmailStatus::Sent {
            tracing::info!(
                user_id = %user.id,
                email_type = %email_type,
                attempts,
                "Notification sent"
            );
        } else {
            tracing::error!(
                user_id = %user.id,
                email_type = %email_type,
                attempts,
                "Notification not delivered"
            );
        }

        let entry = NewEmailLog {
            user_id: user.id,
            email_type,
            recipient: user.email.clone(),
            status,
            error_message,
            attempts: attempts as i32,
        };
        if let Err(e) = self.email_logs.record(entry).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to write email log");
        }

        status == EmailStatus::Sent
    }
}
