//! Incident report notifications.
//!
//! Renders a markdown incident report to styled HTML and delivers it via
//! authenticated SMTP. Recipients are selected by alert severity with a
//! fallback to the warning list for unrecognized severities.

pub mod render;

use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{NotifierConfig, SeverityRoutes};

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyRequest {
    pub alert_name: String,
    pub severity: String,
    pub report_markdown: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotifySummary {
    pub success: bool,
    pub alert_name: String,
    pub severity: String,
    pub recipients: Vec<String>,
    pub subject: String,
}

pub struct Notifier {
    config: NotifierConfig,
}

impl Notifier {
    /// Fails fast when SMTP credentials are absent; the caller decides
    /// whether to run without notifications.
    pub fn new(config: NotifierConfig) -> crate::Result<Self> {
        if !config.is_configured() {
            return Err(crate::Error::Config(
                "SMTP credentials not configured (SMTP_USER and SMTP_PASSWORD required)"
                    .to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub async fn send_report(&self, request: &NotifyRequest) -> crate::Result<NotifySummary> {
        info!(
            alert_name = %request.alert_name,
            severity = %request.severity,
            "Received notification request"
        );

        if !SeverityRoutes::is_recognized(&request.severity) {
            warn!(
                severity = %request.severity,
                "Unrecognized severity, routing to warning recipients"
            );
        }
        let recipients = self.config.recipients.for_severity(&request.severity);
        if recipients.is_empty() {
            return Err(crate::Error::Notify(format!(
                "no recipients configured for severity '{}'",
                request.severity
            )));
        }

        let subject = subject_line(request);
        let html_body = render::render_report(&request.report_markdown);

        self.send(recipients, &subject, &html_body, &request.report_markdown)
            .await?;

        info!(
            recipients = recipients.len(),
            subject = %subject,
            "Notification sent"
        );

        Ok(NotifySummary {
            success: true,
            alert_name: request.alert_name.clone(),
            severity: request.severity.clone(),
            recipients: recipients.to_vec(),
            subject,
        })
    }

    /// Deliver a multipart (plain text + HTML) message over STARTTLS.
    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> crate::Result<()> {
        let from: Mailbox = self
            .config
            .smtp_from
            .parse()
            .map_err(|e| crate::Error::Notify(format!("invalid from address: {e}")))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| crate::Error::Notify(format!("invalid recipient '{recipient}': {e}")))?;
            builder = builder.to(to);
        }

        let email = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| crate::Error::Notify(format!("failed to build message: {e}")))?;

        let creds = Credentials::new(
            self.config.smtp_user.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| crate::Error::Notify(format!("failed to create SMTP transport: {e}")))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| crate::Error::Notify(format!("failed to send email: {e}")))?;

        Ok(())
    }
}

fn subject_line(request: &NotifyRequest) -> String {
    let severity = request.severity.to_uppercase();
    match &request.namespace {
        Some(ns) => format!("[{severity}] {} ({ns})", request.alert_name),
        None => format!("[{severity}] {}", request.alert_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(severity: &str, namespace: Option<&str>) -> NotifyRequest {
        NotifyRequest {
            alert_name: "KubePodCrashLooping".to_string(),
            severity: severity.to_string(),
            report_markdown: "# Report".to_string(),
            namespace: namespace.map(String::from),
        }
    }

    #[test]
    fn subject_includes_severity_and_namespace() {
        assert_eq!(
            subject_line(&request("critical", Some("prod"))),
            "[CRITICAL] KubePodCrashLooping (prod)"
        );
        assert_eq!(
            subject_line(&request("warning", None)),
            "[WARNING] KubePodCrashLooping"
        );
    }

    #[test]
    fn notifier_rejects_missing_credentials() {
        let config = NotifierConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_from: String::new(),
            recipients: SeverityRoutes::default(),
        };
        assert!(Notifier::new(config).is_err());
    }
}
