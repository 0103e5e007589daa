//! AlertManager webhook ingestion.
//!
//! Wire model for the webhook payload plus the per-batch processing loop:
//! sweep the dedup cache, filter non-firing and duplicate alerts, dispatch
//! the survivors, and aggregate ordered per-alert results.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::{InvestigationResult, Investigator};
use crate::dedup::DedupCache;
use crate::metrics;

// AlertManager webhook payload structures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertmanagerWebhook {
    pub version: String,
    #[serde(rename = "groupKey")]
    pub group_key: String,
    /// Batch-level status. Informational only: per-alert status gates
    /// processing.
    pub status: String,
    pub receiver: String,
    #[serde(rename = "groupLabels")]
    pub group_labels: HashMap<String, String>,
    #[serde(rename = "commonLabels")]
    pub common_labels: HashMap<String, String>,
    #[serde(rename = "commonAnnotations")]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub alerts: Vec<AlertmanagerAlert>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertmanagerAlert {
    pub status: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    // Timestamps are opaque wire strings, passed through and never parsed.
    #[serde(rename = "startsAt")]
    pub starts_at: String,
    #[serde(rename = "endsAt", default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
}

impl AlertmanagerAlert {
    pub fn is_firing(&self) -> bool {
        self.status == "firing"
    }

    /// Label lookup with a literal placeholder for absent keys.
    pub fn label_or<'a>(&'a self, key: &str, placeholder: &'a str) -> &'a str {
        self.labels.get(key).map(String::as_str).unwrap_or(placeholder)
    }
}

/// Aggregate response for one processed batch. Duplicates and non-firing
/// alerts are omitted from `results`; they are observable only in logs.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub group_key: String,
    pub alerts_received: usize,
    pub alerts_processed: usize,
    pub results: Vec<InvestigationResult>,
}

pub struct WebhookHandler {
    cache: Arc<DedupCache>,
    investigator: Arc<dyn Investigator>,
}

impl WebhookHandler {
    pub fn new(cache: Arc<DedupCache>, investigator: Arc<dyn Investigator>) -> Self {
        Self { cache, investigator }
    }

    pub async fn process(&self, payload: AlertmanagerWebhook) -> WebhookResponse {
        info!(
            group_key = %payload.group_key,
            status = %payload.status,
            alerts = payload.alerts.len(),
            "Received AlertManager webhook"
        );
        metrics::ALERTS_RECEIVED_TOTAL.inc_by(payload.alerts.len() as u64);

        let evicted = self.cache.sweep_expired(Utc::now());
        if evicted > 0 {
            debug!(evicted, "Swept expired entries from dedup cache");
            metrics::DEDUP_EVICTIONS_TOTAL.inc_by(evicted as u64);
        }

        let mut results = Vec::new();
        for alert in &payload.alerts {
            if !alert.is_firing() {
                info!(
                    fingerprint = %alert.fingerprint,
                    status = %alert.status,
                    "Skipping non-firing alert"
                );
                continue;
            }

            if self.cache.check_and_mark(&alert.fingerprint, Utc::now()) {
                info!(fingerprint = %alert.fingerprint, "Skipping duplicate alert");
                metrics::ALERTS_DEDUPLICATED_TOTAL.inc();
                continue;
            }

            info!(
                alert_name = alert.label_or("alertname", "Unknown"),
                severity = alert.label_or("severity", "unknown"),
                namespace = alert.label_or("namespace", "unknown"),
                fingerprint = %alert.fingerprint,
                "Processing alert"
            );

            // invoke classifies every failure mode into the result, so one
            // failing alert cannot abort the rest of the batch.
            let result = self.investigator.invoke(alert, &payload).await;
            if result.is_triggered() {
                metrics::INVESTIGATIONS_TRIGGERED_TOTAL.inc();
            } else {
                metrics::INVESTIGATIONS_FAILED_TOTAL.inc();
            }
            results.push(result);
        }

        WebhookResponse {
            status: "processed",
            group_key: payload.group_key.clone(),
            alerts_received: payload.alerts.len(),
            alerts_processed: results.len(),
            results,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::InvestigationOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub(crate) fn alert(status: &str, fingerprint: &str) -> AlertmanagerAlert {
        AlertmanagerAlert {
            status: status.to_string(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: "2024-10-11T14:30:00Z".to_string(),
            ends_at: None,
            generator_url: "http://prometheus/graph".to_string(),
            fingerprint: fingerprint.to_string(),
        }
    }

    pub(crate) fn named_alert(status: &str, fingerprint: &str, name: &str) -> AlertmanagerAlert {
        let mut a = alert(status, fingerprint);
        a.labels.insert("alertname".to_string(), name.to_string());
        a
    }

    pub(crate) fn batch_with(alerts: Vec<AlertmanagerAlert>) -> AlertmanagerWebhook {
        AlertmanagerWebhook {
            version: "4".to_string(),
            group_key: "{}/{}:{}".to_string(),
            status: "firing".to_string(),
            receiver: "rca-operator".to_string(),
            group_labels: HashMap::new(),
            common_labels: HashMap::new(),
            common_annotations: HashMap::new(),
            external_url: "http://alertmanager:9093".to_string(),
            alerts,
        }
    }

    /// Investigator that records invocation order and fails the alerts it
    /// is told to fail.
    struct ScriptedInvestigator {
        invoked: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    impl ScriptedInvestigator {
        fn new(failing: &[&str]) -> Self {
            Self {
                invoked: Mutex::new(Vec::new()),
                failing: failing.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Investigator for ScriptedInvestigator {
        async fn invoke(
            &self,
            alert: &AlertmanagerAlert,
            _batch: &AlertmanagerWebhook,
        ) -> InvestigationResult {
            self.invoked
                .lock()
                .unwrap()
                .push(alert.fingerprint.clone());
            let outcome = if self.failing.contains(&alert.fingerprint) {
                InvestigationOutcome::Error {
                    error: "connection refused".to_string(),
                }
            } else {
                InvestigationOutcome::Triggered {
                    result: serde_json::json!({ "ok": true }),
                }
            };
            InvestigationResult {
                fingerprint: alert.fingerprint.clone(),
                alert_name: alert.label_or("alertname", "Unknown").to_string(),
                outcome,
            }
        }
    }

    fn handler(failing: &[&str]) -> WebhookHandler {
        WebhookHandler::new(
            Arc::new(DedupCache::new()),
            Arc::new(ScriptedInvestigator::new(failing)),
        )
    }

    #[tokio::test]
    async fn processes_firing_alerts_in_input_order() {
        let handler = handler(&[]);
        let batch = batch_with(vec![
            named_alert("firing", "fp-a", "A"),
            named_alert("firing", "fp-b", "B"),
            named_alert("firing", "fp-c", "C"),
        ]);

        let response = handler.process(batch).await;

        assert_eq!(response.alerts_received, 3);
        assert_eq!(response.alerts_processed, 3);
        let order: Vec<&str> = response.results.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(order, ["fp-a", "fp-b", "fp-c"]);
    }

    #[tokio::test]
    async fn failing_alert_does_not_abort_the_batch() {
        let handler = handler(&["fp-b"]);
        let batch = batch_with(vec![
            named_alert("firing", "fp-a", "A"),
            named_alert("firing", "fp-b", "B"),
            named_alert("firing", "fp-c", "C"),
        ]);

        let response = handler.process(batch).await;

        assert_eq!(response.alerts_processed, 3);
        assert!(response.results[0].is_triggered());
        assert!(!response.results[1].is_triggered());
        assert!(response.results[2].is_triggered());
        match &response.results[1].outcome {
            InvestigationOutcome::Error { error } => assert!(error.contains("connection refused")),
            other => panic!("expected error outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_firing_alerts_are_excluded_from_results() {
        let handler = handler(&[]);
        let batch = batch_with(vec![
            named_alert("resolved", "fp-a", "A"),
            named_alert("firing", "fp-b", "B"),
        ]);

        let response = handler.process(batch).await;

        assert_eq!(response.alerts_received, 2);
        assert_eq!(response.alerts_processed, 1);
        assert_eq!(response.results[0].fingerprint, "fp-b");
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_suppressed_within_window() {
        let handler = handler(&[]);

        let first = handler
            .process(batch_with(vec![named_alert("firing", "fp-a", "A")]))
            .await;
        assert_eq!(first.alerts_processed, 1);

        let second = handler
            .process(batch_with(vec![named_alert("firing", "fp-a", "A")]))
            .await;
        assert_eq!(second.alerts_received, 1);
        assert_eq!(second.alerts_processed, 0);
        assert!(second.results.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_a_success() {
        let handler = handler(&[]);
        let response = handler.process(batch_with(vec![])).await;

        assert_eq!(response.status, "processed");
        assert_eq!(response.alerts_received, 0);
        assert_eq!(response.alerts_processed, 0);
    }

    #[test]
    fn result_entries_serialize_with_wire_field_names() {
        let triggered = InvestigationResult {
            fingerprint: "fp1".to_string(),
            alert_name: "PodCrash".to_string(),
            outcome: InvestigationOutcome::Triggered {
                result: serde_json::json!({ "ok": true }),
            },
        };
        let value = serde_json::to_value(&triggered).unwrap();
        assert_eq!(value["fingerprint"], "fp1");
        assert_eq!(value["alertname"], "PodCrash");
        assert_eq!(value["status"], "triggered");
        assert_eq!(value["result"]["ok"], true);

        let timeout = InvestigationResult {
            fingerprint: "fp2".to_string(),
            alert_name: "SlowAgent".to_string(),
            outcome: InvestigationOutcome::Timeout,
        };
        let value = serde_json::to_value(&timeout).unwrap();
        assert_eq!(value["status"], "timeout");
        assert!(value.get("result").is_none());
    }
}
