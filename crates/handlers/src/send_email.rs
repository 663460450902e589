// SMTP send handler

use crate::parse_payload;
use async_trait::async_trait;
use goflow_core::error::{AppError, Result};
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// SMTP relay settings, sourced from the environment at startup
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailPayload {
    to: String,
    subject: String,
    body: String,
}

/// `send_email`: `{to, subject, body}` as a plain-text message through
/// the configured STARTTLS relay
pub struct SendEmailHandler {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SendEmailHandler {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Config(format!("smtp relay setup failed: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let from: Mailbox = config
            .user
            .parse()
            .map_err(|e| AppError::Config(format!("invalid smtp sender address: {e}")))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl JobHandler for SendEmailHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: SendEmailPayload = parse_payload("send_email", payload)?;

        let to: Mailbox = params
            .to
            .parse()
            .map_err(|e| HandlerError::validation(format!("invalid 'to' address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&params.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(params.body)
            .map_err(|e| HandlerError::validation(format!("failed to build message: {e}")))?;

        match self.transport.send(message).await {
            Ok(_) => Ok(HandlerOutput::json(
                200,
                &serde_json::json!({"message": "email sent"}),
            )),
            Err(e) => Err(HandlerError {
                kind: goflow_core::port::HandlerErrorKind::Upstream,
                message: format!("smtp send failed: {e}"),
                status_code: Some(500),
                body: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflow_core::port::HandlerErrorKind;

    fn handler() -> SendEmailHandler {
        SendEmailHandler::new(&SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "sender@example.com".to_string(),
            pass: "hunter2".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_payload_without_subject() {
        let err = handler()
            .handle(&serde_json::json!({"to": "a@example.com", "body": "hi"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::Validation);
        assert!(err.message.contains("subject"));
    }

    #[tokio::test]
    async fn rejects_unparseable_recipient() {
        let err = handler()
            .handle(&serde_json::json!({
                "to": "not an address",
                "subject": "hello",
                "body": "hi",
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::Validation);
    }
}
