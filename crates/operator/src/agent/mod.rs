//! Investigation dispatch.
//!
//! Builds an investigation request from an alert and its webhook batch
//! context, sends it to the downstream agent endpoint, and classifies the
//! outcome. Every failure mode is a typed outcome so one failing alert can
//! never abort the rest of a batch.

pub mod client;
pub mod tools;

pub use client::{build_investigation_prompt, AgentClient};

use async_trait::async_trait;
use serde::Serialize;

use crate::sources::webhook::{AlertmanagerAlert, AlertmanagerWebhook};

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InvestigationOutcome {
    /// The agent accepted the investigation; carries its decoded response.
    Triggered { result: serde_json::Value },
    /// Non-2xx response, transport failure, or undecodable success body.
    Error { error: String },
    /// The invocation exceeded the configured timeout.
    Timeout,
}

/// Per-alert result entry, serialized into the webhook response.
#[derive(Debug, Clone, Serialize)]
pub struct InvestigationResult {
    pub fingerprint: String,
    #[serde(rename = "alertname")]
    pub alert_name: String,
    #[serde(flatten)]
    pub outcome: InvestigationOutcome,
}

impl InvestigationResult {
    pub fn is_triggered(&self) -> bool {
        matches!(self.outcome, InvestigationOutcome::Triggered { .. })
    }
}

/// Seam between the ingestion controller and the downstream agent.
#[async_trait]
pub trait Investigator: Send + Sync {
    async fn invoke(
        &self,
        alert: &AlertmanagerAlert,
        batch: &AlertmanagerWebhook,
    ) -> InvestigationResult;
}
