//! Account email delivery.
//!
//! Supports multiple email providers:
//! - `console`: Logs emails (development)
//! - `smtp`: Sends through an SMTP relay with lettre
//! - `sendgrid`: Uses the SendGrid v3 API

use async_trait::async_trait;
use domain::services::{Notifier, NotifyError};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::EmailConfig;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    /// The provider refused the message permanently.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

impl From<EmailError> for NotifyError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::InvalidAddress(_) | EmailError::Rejected(_) => {
                NotifyError::Bounced(err.to_string())
            }
            other => NotifyError::Delivery(other.to_string()),
        }
    }
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

enum Transport {
    Disabled,
    Console,
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    SendGrid(reqwest::Client),
}

/// Sends verification, approval and rejection emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    transport: Arc<Transport>,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("enabled", &self.config.enabled)
            .field("provider", &self.config.provider)
            .finish()
    }
}

fn smtp_transport(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
    if config.smtp_host.is_empty() {
        return Err(EmailError::NotConfigured("smtp_host is empty".to_string()));
    }

    let builder = if config.smtp_use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| EmailError::NotConfigured(format!("SMTP relay: {}", e)))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);
    let builder = if config.smtp_username.is_empty() {
        builder
    } else {
        builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ))
    };
    Ok(builder.build())
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, EmailError> {
    let address = address
        .parse()
        .map_err(|_| EmailError::InvalidAddress(address.to_string()))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

fn greeting(name: &str) -> String {
    if name.trim().is_empty() {
        "Hi".to_string()
    } else {
        format!("Hi {}", name.trim())
    }
}

fn html_page(title: &str, paragraphs: &[String]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("        <p>{}</p>\n", p))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
</head>
<body style="font-family: Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="margin-top: 0;">{title}</h2>
{body}</body>
</html>"#
    )
}

impl EmailService {
    /// Builds the configured transport. An unknown provider or an SMTP
    /// provider without a host is a configuration error.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let transport = if !config.enabled {
            Transport::Disabled
        } else {
            match config.provider.as_str() {
                "console" => Transport::Console,
                "smtp" => Transport::Smtp(smtp_transport(&config)?),
                "sendgrid" if config.sendgrid_api_key.is_empty() => {
                    return Err(EmailError::NotConfigured(
                        "sendgrid_api_key is empty".to_string(),
                    ))
                }
                "sendgrid" => Transport::SendGrid(reqwest::Client::new()),
                other => {
                    return Err(EmailError::NotConfigured(format!(
                        "unknown provider '{}'",
                        other
                    )))
                }
            }
        };

        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(*self.transport, Transport::Disabled)
    }

    pub fn verification_url(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.config.base_url.trim_end_matches('/'),
            token
        )
    }

    fn with_html(&self, title: &str, paragraphs: &[String]) -> Option<String> {
        (self.config.template_style == "html").then(|| html_page(title, paragraphs))
    }

    /// Send an email message through the configured transport.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        match self.transport.as_ref() {
            Transport::Disabled => {
                debug!(
                    to = %message.to,
                    subject = %message.subject,
                    "Email service disabled, skipping send"
                );
                Ok(())
            }
            Transport::Console => {
                self.send_console(&message);
                Ok(())
            }
            Transport::Smtp(mailer) => self.send_smtp(mailer, message).await,
            Transport::SendGrid(client) => self.send_sendgrid(client, message).await,
        }
    }

    pub fn verification_message(&self, to: &str, name: &str, token: &str) -> EmailMessage {
        let url = self.verification_url(token);
        let body_text = format!(
            "{greeting},\n\nPlease verify your email address by opening the link below:\n\n{url}\n\n\
             This link expires in 24 hours. After verification an administrator will review your account.\n\n\
             If you did not sign up, you can ignore this email.",
            greeting = greeting(name),
        );
        let body_html = self.with_html(
            "Verify your email address",
            &[
                format!("{},", greeting(name)),
                format!(
                    r#"Please verify your email address: <a href="{url}">Verify email</a>"#
                ),
                "After verification an administrator will review your account.".to_string(),
            ],
        );
        EmailMessage {
            to: to.to_string(),
            to_name: Some(name.to_string()),
            subject: format!("Verify your email address - {}", self.config.sender_name),
            body_text,
            body_html,
        }
    }

    pub fn approval_message(&self, to: &str, name: &str) -> EmailMessage {
        let body_text = format!(
            "{},\n\nYour account has been approved. You can now log in and register for rallies.",
            greeting(name)
        );
        let body_html = self.with_html(
            "Your account has been approved",
            &[
                format!("{},", greeting(name)),
                "You can now log in and register for rallies.".to_string(),
            ],
        );
        EmailMessage {
            to: to.to_string(),
            to_name: Some(name.to_string()),
            subject: format!("Account approved - {}", self.config.sender_name),
            body_text,
            body_html,
        }
    }

    pub fn rejection_message(&self, to: &str, name: &str, reason: Option<&str>) -> EmailMessage {
        let reason_line = reason
            .map(|r| format!("Reason: {}", r))
            .unwrap_or_else(|| "No reason was given.".to_string());
        let body_text = format!(
            "{},\n\nYour account registration has been rejected.\n\n{}",
            greeting(name),
            reason_line
        );
        let body_html = self.with_html(
            "Your registration was rejected",
            &[
                format!("{},", greeting(name)),
                "Your account registration has been rejected.".to_string(),
                reason_line,
            ],
        );
        EmailMessage {
            to: to.to_string(),
            to_name: Some(name.to_string()),
            subject: format!("Account registration rejected - {}", self.config.sender_name),
            body_text,
            body_html,
        }
    }

    fn send_console(&self, message: &EmailMessage) {
        info!(
            to = %message.to,
            to_name = ?message.to_name,
            subject = %message.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        info!(body_text = %message.body_text, "Email body (plain text)");
        if let Some(html) = &message.body_html {
            debug!(body_html_length = html.len(), "Email body (HTML)");
        }
    }

    async fn send_smtp(
        &self,
        mailer: &AsyncSmtpTransport<Tokio1Executor>,
        message: EmailMessage,
    ) -> Result<(), EmailError> {
        let builder = Message::builder()
            .from(mailbox(
                Some(&self.config.sender_name),
                &self.config.sender_email,
            )?)
            .to(mailbox(message.to_name.as_deref(), &message.to)?)
            .subject(message.subject.clone());

        let email = match message.body_html {
            Some(html) => {
                builder.multipart(MultiPart::alternative_plain_html(message.body_text, html))
            }
            None => builder.body(message.body_text),
        }
        .map_err(|e| EmailError::SendFailed(format!("Failed to build message: {}", e)))?;

        match mailer.send(email).await {
            Ok(_) => {
                info!(to = %message.to, subject = %message.subject, "Email sent via SMTP");
                Ok(())
            }
            Err(e) if e.is_permanent() => Err(EmailError::Rejected(e.to_string())),
            Err(e) => Err(EmailError::SendFailed(format!("SMTP error: {}", e))),
        }
    }

    async fn send_sendgrid(
        &self,
        client: &reqwest::Client,
        message: EmailMessage,
    ) -> Result<(), EmailError> {
        let mut recipient = serde_json::json!({ "email": message.to });
        if let Some(name) = &message.to_name {
            recipient["name"] = serde_json::json!(name);
        }

        let mut content = vec![serde_json::json!({
            "type": "text/plain",
            "value": message.body_text
        })];
        if let Some(html) = &message.body_html {
            content.push(serde_json::json!({ "type": "text/html", "value": html }));
        }

        let body = serde_json::json!({
            "personalizations": [{ "to": [recipient] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": content
        });

        let response = client
            .post(SENDGRID_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via SendGrid");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, error = %error_body, "SendGrid API error");
        let detail = format!("SendGrid returned {}: {}", status, error_body);
        if status.is_client_error() {
            Err(EmailError::Rejected(detail))
        } else {
            Err(EmailError::SendFailed(detail))
        }
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send_verification(
        &self,
        recipient: &str,
        name: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        let message = self.verification_message(recipient, name, token);
        Ok(self.send(message).await?)
    }

    async fn send_approval(&self, recipient: &str, name: &str) -> Result<(), NotifyError> {
        Ok(self.send(self.approval_message(recipient, name)).await?)
    }

    async fn send_rejection(
        &self,
        recipient: &str,
        name: &str,
        reason: Option<&str>,
    ) -> Result<(), NotifyError> {
        let message = self.rejection_message(recipient, name, reason);
        Ok(self.send(message).await?)
    }
}
