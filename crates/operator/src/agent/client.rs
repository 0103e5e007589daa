use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::{InvestigationOutcome, InvestigationResult, Investigator};
use crate::config::AgentConfig;
use crate::sources::webhook::{AlertmanagerAlert, AlertmanagerWebhook};

/// HTTP client for the downstream investigation agent.
pub struct AgentClient {
    endpoint: String,
    client: Client,
}

impl AgentClient {
    pub fn new(config: &AgentConfig) -> crate::Result<Self> {
        if config.endpoint.is_empty() {
            return Err(crate::Error::Config(
                "agent endpoint is not configured".to_string(),
            ));
        }
        Url::parse(&config.endpoint).map_err(|e| {
            crate::Error::Config(format!("invalid agent endpoint '{}': {e}", config.endpoint))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| crate::Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }
}

#[async_trait]
impl Investigator for AgentClient {
    async fn invoke(
        &self,
        alert: &AlertmanagerAlert,
        batch: &AlertmanagerWebhook,
    ) -> InvestigationResult {
        let prompt = build_investigation_prompt(alert, batch);
        let alert_name = alert.label_or("alertname", "Unknown").to_string();

        info!(alert_name = %alert_name, fingerprint = %alert.fingerprint, "Triggering agent investigation");
        debug!(prompt_len = prompt.len(), "Built investigation prompt");

        let outcome = match self
            .client
            .post(&self.endpoint)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.json::<serde_json::Value>().await {
                        Ok(body) => {
                            info!(fingerprint = %alert.fingerprint, "Agent investigation triggered");
                            InvestigationOutcome::Triggered { result: body }
                        }
                        Err(e) => {
                            error!(fingerprint = %alert.fingerprint, "Failed to decode agent response: {e}");
                            InvestigationOutcome::Error {
                                error: format!("failed to decode agent response: {e}"),
                            }
                        }
                    }
                } else {
                    let body = response.text().await.unwrap_or_default();
                    error!(fingerprint = %alert.fingerprint, %status, "Agent returned error status");
                    InvestigationOutcome::Error {
                        error: format!("HTTP {status}: {body}"),
                    }
                }
            }
            Err(e) if e.is_timeout() => {
                error!(fingerprint = %alert.fingerprint, "Agent investigation timed out");
                InvestigationOutcome::Timeout
            }
            Err(e) => {
                error!(fingerprint = %alert.fingerprint, "Failed to reach agent: {e}");
                InvestigationOutcome::Error {
                    error: format!("agent request failed: {e}"),
                }
            }
        };

        InvestigationResult {
            fingerprint: alert.fingerprint.clone(),
            alert_name,
            outcome,
        }
    }
}

/// Build the instruction text for the downstream agent. Deterministic in
/// its inputs: label and annotation sets are rendered in key order.
pub fn build_investigation_prompt(
    alert: &AlertmanagerAlert,
    batch: &AlertmanagerWebhook,
) -> String {
    let alert_name = alert.label_or("alertname", "Unknown");
    let severity = alert.label_or("severity", "unknown");
    let namespace = alert.label_or("namespace", "unknown");
    let pod = alert.label_or("pod", "unknown");

    let mut prompt = String::new();
    prompt.push_str("ALERT RECEIVED - INVESTIGATE AND ANALYZE\n\n");
    prompt.push_str(&format!("Alert Name: {alert_name}\n"));
    prompt.push_str(&format!("Severity: {severity}\n"));
    prompt.push_str(&format!("Status: {}\n", alert.status));
    prompt.push_str(&format!("Started At: {}\n", alert.starts_at));
    prompt.push_str(&format!("Fingerprint: {}\n", alert.fingerprint));

    prompt.push_str("\nALERT LABELS:\n");
    prompt.push_str(&format_map(&alert.labels));

    prompt.push_str("\nALERT ANNOTATIONS:\n");
    prompt.push_str(&format_map(&alert.annotations));

    prompt.push_str("\nGENERATOR URL:\n");
    prompt.push_str(&format!("{}\n", alert.generator_url));

    prompt.push_str("\nCONTEXT:\n");
    prompt.push_str(&format!("- Namespace: {namespace}\n"));
    prompt.push_str(&format!("- Pod: {pod}\n"));
    prompt.push_str(&format!("- Group Key: {}\n", batch.group_key));

    prompt.push_str(
        "\nINSTRUCTIONS:\n\n\
         1. Read your memory files to understand the cluster context\n\
            - Check discovered-tools.md for known services\n\
            - Review known-issues.md for similar past issues\n\
            - Check namespace-map.md for namespace topology\n\n\
         2. Based on the alert type and your knowledge:\n\
            - Identify the likely cause\n\
            - Suggest investigation commands\n\
            - Recommend immediate actions\n\n\
         3. Provide a clear, concise response with:\n\
            - What you know about this service/namespace\n\
            - Likely root causes based on alert type\n\
            - Specific kubectl commands to investigate further\n\
            - Immediate mitigation suggestions\n\n\
         Begin your analysis now.\n",
    );

    prompt
}

fn format_map(map: &std::collections::HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("  {k}: {}\n", map[*k]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::webhook::tests::{alert, batch_with};

    #[test]
    fn prompt_contains_all_alert_context() {
        let mut a = alert("firing", "fp1");
        a.labels.insert("alertname".to_string(), "PodCrash".to_string());
        a.labels.insert("severity".to_string(), "critical".to_string());
        a.labels.insert("namespace".to_string(), "prod".to_string());
        a.labels.insert("pod".to_string(), "api-0".to_string());
        a.annotations.insert("summary".to_string(), "pod is crash looping".to_string());
        let batch = batch_with(vec![a.clone()]);

        let prompt = build_investigation_prompt(&a, &batch);

        assert!(prompt.contains("Alert Name: PodCrash"));
        assert!(prompt.contains("Severity: critical"));
        assert!(prompt.contains("Status: firing"));
        assert!(prompt.contains("Started At: 2024-10-11T14:30:00Z"));
        assert!(prompt.contains("Fingerprint: fp1"));
        assert!(prompt.contains("  severity: critical"));
        assert!(prompt.contains("  summary: pod is crash looping"));
        assert!(prompt.contains("http://prometheus/graph"));
        assert!(prompt.contains("- Namespace: prod"));
        assert!(prompt.contains("- Pod: api-0"));
        assert!(prompt.contains("- Group Key: {}/{}:{}"));
    }

    #[test]
    fn missing_labels_render_placeholders() {
        let a = alert("firing", "fp1");
        let batch = batch_with(vec![a.clone()]);

        let prompt = build_investigation_prompt(&a, &batch);

        assert!(prompt.contains("Alert Name: Unknown"));
        assert!(prompt.contains("Severity: unknown"));
        assert!(prompt.contains("- Namespace: unknown"));
        assert!(prompt.contains("- Pod: unknown"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let mut a = alert("firing", "fp1");
        for (k, v) in [("b", "2"), ("a", "1"), ("c", "3")] {
            a.labels.insert(k.to_string(), v.to_string());
        }
        let batch = batch_with(vec![a.clone()]);

        assert_eq!(
            build_investigation_prompt(&a, &batch),
            build_investigation_prompt(&a, &batch)
        );
        // Key-ordered rendering.
        let prompt = build_investigation_prompt(&a, &batch);
        let pos_a = prompt.find("  a: 1").unwrap();
        let pos_b = prompt.find("  b: 2").unwrap();
        let pos_c = prompt.find("  c: 3").unwrap();
        assert!(pos_a < pos_b && pos_b < pos_c);
    }
}
