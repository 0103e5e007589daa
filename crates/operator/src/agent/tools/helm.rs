//! Helm release inspector.
//!
//! Answers questions about Helm-managed applications by shelling out to
//! `helm` and `kubectl`, re-formatting their JSON output as readable text.
//! Every command carries a bounded timeout.

use serde_json::Value;
use std::time::Duration;

use super::{run_command, ToolError, ToolResult};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

// Rendered manifests can be enormous; cap what we return.
const MANIFEST_MAX_LEN: usize = 5000;

#[derive(Debug, Clone)]
pub enum HelmAction {
    List {
        namespace: Option<String>,
        all_namespaces: bool,
    },
    Details {
        release: String,
        namespace: String,
    },
    Values {
        release: String,
        namespace: String,
        all_values: bool,
    },
    Manifest {
        release: String,
        namespace: String,
    },
    History {
        release: String,
        namespace: String,
        limit: usize,
    },
    Compare {
        release: String,
        namespace: String,
        revision_a: u32,
        revision_b: u32,
    },
    Health {
        release: String,
        namespace: String,
    },
}

pub async fn run(action: HelmAction) -> ToolResult {
    match action {
        HelmAction::List {
            namespace,
            all_namespaces,
        } => list_releases(namespace.as_deref(), all_namespaces).await,
        HelmAction::Details { release, namespace } => release_details(&release, &namespace).await,
        HelmAction::Values {
            release,
            namespace,
            all_values,
        } => release_values(&release, &namespace, all_values).await,
        HelmAction::Manifest { release, namespace } => release_manifest(&release, &namespace).await,
        HelmAction::History {
            release,
            namespace,
            limit,
        } => release_history(&release, &namespace, limit).await,
        HelmAction::Compare {
            release,
            namespace,
            revision_a,
            revision_b,
        } => compare_revisions(&release, &namespace, revision_a, revision_b).await,
        HelmAction::Health { release, namespace } => release_health(&release, &namespace).await,
    }
}

async fn helm(args: &[&str]) -> std::result::Result<String, ToolError> {
    let output = run_command("helm", args, COMMAND_TIMEOUT).await?;
    if !output.success {
        return Err(ToolError::Command(output.stderr.trim().to_string()));
    }
    Ok(output.stdout)
}

async fn list_releases(namespace: Option<&str>, all_namespaces: bool) -> ToolResult {
    let mut args = vec!["list", "--output", "json"];
    if all_namespaces {
        args.push("--all-namespaces");
    } else if let Some(ns) = namespace {
        args.extend(["--namespace", ns]);
    }

    let stdout = helm(&args).await?;
    let releases: Vec<Value> = if stdout.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&stdout).map_err(|e| ToolError::Parse(e.to_string()))?
    };

    Ok(format_release_list(&releases))
}

async fn release_details(release: &str, namespace: &str) -> ToolResult {
    let stdout = helm(&["status", release, "--namespace", namespace, "--output", "json"]).await?;
    let data: Value = serde_json::from_str(&stdout).map_err(|e| ToolError::Parse(e.to_string()))?;
    Ok(format_release_details(release, namespace, &data))
}

async fn release_values(release: &str, namespace: &str, all_values: bool) -> ToolResult {
    let mut args = vec!["get", "values", release, "--namespace", namespace];
    if all_values {
        args.push("--all");
    }

    let stdout = helm(&args).await?;
    if stdout.trim().is_empty() || stdout.trim() == "null" {
        return Ok(format!(
            "No custom values set for release '{release}' (using chart defaults)"
        ));
    }
    Ok(format!("# Values for {release}\n\n```yaml\n{stdout}\n```"))
}

async fn release_manifest(release: &str, namespace: &str) -> ToolResult {
    let stdout = helm(&["get", "manifest", release, "--namespace", namespace]).await?;

    if stdout.len() > MANIFEST_MAX_LEN {
        let truncated: String = stdout.chars().take(MANIFEST_MAX_LEN).collect();
        return Ok(format!(
            "# Manifest for {release} (truncated)\n\n```yaml\n{truncated}\n...\n[Truncated - manifest too large]\n```"
        ));
    }
    Ok(format!("# Manifest for {release}\n\n```yaml\n{stdout}\n```"))
}

async fn release_history(release: &str, namespace: &str, limit: usize) -> ToolResult {
    let max = limit.to_string();
    let stdout = helm(&[
        "history", release, "--namespace", namespace, "--output", "json", "--max", &max,
    ])
    .await?;
    let history: Vec<Value> =
        serde_json::from_str(&stdout).map_err(|e| ToolError::Parse(e.to_string()))?;
    Ok(format_release_history(release, &history, limit))
}

async fn compare_revisions(
    release: &str,
    namespace: &str,
    revision_a: u32,
    revision_b: u32,
) -> ToolResult {
    let rev_a = revision_a.to_string();
    let rev_b = revision_b.to_string();
    let values_a = helm(&[
        "get", "values", release, "--namespace", namespace, "--revision", &rev_a,
    ])
    .await?;
    let values_b = helm(&[
        "get", "values", release, "--namespace", namespace, "--revision", &rev_b,
    ])
    .await?;

    let mut result = format!("# Revision Comparison: {release}\n\n");
    result.push_str(&format!(
        "## Revision {revision_a} Values\n```yaml\n{}\n```\n\n",
        non_empty(&values_a)
    ));
    result.push_str(&format!(
        "## Revision {revision_b} Values\n```yaml\n{}\n```\n\n",
        non_empty(&values_b)
    ));
    result.push_str("Use diff tools to identify specific changes between these values.\n");
    Ok(result)
}

async fn release_health(release: &str, namespace: &str) -> ToolResult {
    let stdout = helm(&["status", release, "--namespace", namespace, "--output", "json"]).await?;
    let data: Value = serde_json::from_str(&stdout).map_err(|e| ToolError::Parse(e.to_string()))?;
    let status = data["info"]["status"].as_str().unwrap_or("unknown");

    let mut result = format!("# Health Check: {release}\n\n**Helm Status:** {status}\n\n");
    if status != "deployed" {
        result.push_str(&format!(
            "**WARNING:** Release is not in 'deployed' state. Current state: {status}\n\n"
        ));
    }

    // Pods managed by this release, matched by the standard instance label.
    let selector = format!("app.kubernetes.io/instance={release}");
    let pods = run_command(
        "kubectl",
        &[
            "get", "pods", "-n", namespace, "-l", &selector, "--output", "json",
        ],
        COMMAND_TIMEOUT,
    )
    .await?;

    if pods.success {
        match serde_json::from_str::<Value>(&pods.stdout) {
            Ok(data) => result.push_str(&format_pod_health(&data)),
            Err(e) => return Err(ToolError::Parse(e.to_string())),
        }
    } else {
        result.push_str("Could not retrieve pod information (release may not manage pods)\n");
    }

    Ok(result)
}

// JSON scalars rendered without surrounding quotes.
fn json_str(v: &Value) -> String {
    match v.as_str() {
        Some(s) => s.to_string(),
        None => v.to_string(),
    }
}

fn non_empty(values: &str) -> &str {
    let trimmed = values.trim();
    if trimmed.is_empty() {
        "null"
    } else {
        trimmed
    }
}

fn format_release_list(releases: &[Value]) -> String {
    if releases.is_empty() {
        return "No Helm releases found".to_string();
    }

    let mut result = format!("Found {} Helm release(s):\n\n", releases.len());
    for r in releases {
        result.push_str(&format!(
            "- **{}** (namespace: {})\n",
            r["name"].as_str().unwrap_or("unknown"),
            r["namespace"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!("  - Chart: {}\n", r["chart"].as_str().unwrap_or("unknown")));
        result.push_str(&format!(
            "  - App Version: {}\n",
            r["app_version"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!("  - Status: {}\n", r["status"].as_str().unwrap_or("unknown")));
        result.push_str(&format!("  - Updated: {}\n", r["updated"].as_str().unwrap_or("unknown")));
        result.push_str(&format!("  - Revision: {}\n\n", json_str(&r["revision"])));
    }
    result
}

fn format_release_details(release: &str, namespace: &str, data: &Value) -> String {
    let info = &data["info"];
    let mut result = format!("# Helm Release: {release}\n\n");
    result.push_str(&format!("**Namespace:** {namespace}\n"));
    result.push_str(&format!(
        "**Status:** {}\n",
        info["status"].as_str().unwrap_or("unknown")
    ));
    result.push_str(&format!(
        "**Description:** {}\n",
        info["description"].as_str().unwrap_or("unknown")
    ));
    result.push_str(&format!(
        "**First Deployed:** {}\n",
        info["first_deployed"].as_str().unwrap_or("unknown")
    ));
    result.push_str(&format!(
        "**Last Deployed:** {}\n",
        info["last_deployed"].as_str().unwrap_or("unknown")
    ));
    result.push_str(&format!(
        "**Notes:**\n```\n{}\n```\n",
        info["notes"].as_str().unwrap_or("No notes")
    ));
    result
}

fn format_release_history(release: &str, history: &[Value], limit: usize) -> String {
    if history.is_empty() {
        return format!("No history found for release '{release}'");
    }

    let mut result = format!("# Release History: {release}\n\n");
    result.push_str(&format!(
        "Showing last {} revision(s):\n\n",
        history.len().min(limit)
    ));

    // Newest first.
    for h in history.iter().rev() {
        result.push_str(&format!("## Revision {}\n", json_str(&h["revision"])));
        result.push_str(&format!(
            "- **Updated:** {}\n",
            h["updated"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Status:** {}\n",
            h["status"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Chart:** {}\n",
            h["chart"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **App Version:** {}\n",
            h["app_version"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Description:** {}\n\n",
            h["description"].as_str().unwrap_or("unknown")
        ));
    }
    result
}

fn format_pod_health(pod_list: &Value) -> String {
    let pods = pod_list["items"].as_array().cloned().unwrap_or_default();
    let mut result = format!("## Pod Health ({} pod(s))\n\n", pods.len());

    for pod in &pods {
        let name = pod["metadata"]["name"].as_str().unwrap_or("unknown");
        let phase = pod["status"]["phase"].as_str().unwrap_or("Unknown");
        result.push_str(&format!("- **{name}:** {phase}\n"));

        for cs in pod["status"]["containerStatuses"].as_array().unwrap_or(&Vec::new()) {
            let container = cs["name"].as_str().unwrap_or("unknown");
            let ready = cs["ready"].as_bool().unwrap_or(false);
            let restarts = cs["restartCount"].as_u64().unwrap_or(0);
            result.push_str(&format!(
                "  - Container `{container}`: Ready={ready}, Restarts={restarts}\n"
            ));

            if !ready || restarts > 0 {
                if let Some(waiting) = cs["state"]["waiting"].as_object() {
                    let reason = waiting
                        .get("reason")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown");
                    let message = waiting
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    result.push_str(&format!("    - **Issue:** {reason} - {message}\n"));
                }
            }
        }
    }
    result.push('\n');
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_release_list() {
        let releases = vec![json!({
            "name": "prometheus",
            "namespace": "monitoring",
            "chart": "prometheus-25.8.0",
            "app_version": "2.48.0",
            "status": "deployed",
            "updated": "2024-10-01 10:00:00",
            "revision": "3"
        })];

        let text = format_release_list(&releases);
        assert!(text.contains("Found 1 Helm release(s)"));
        assert!(text.contains("**prometheus** (namespace: monitoring)"));
        assert!(text.contains("Chart: prometheus-25.8.0"));
        assert!(text.contains("Revision: 3"));
    }

    #[test]
    fn empty_release_list_has_a_message() {
        assert_eq!(format_release_list(&[]), "No Helm releases found");
    }

    #[test]
    fn formats_release_history_newest_first() {
        let history = vec![
            json!({"revision": 1, "updated": "t1", "status": "superseded", "chart": "app-1.0.0", "app_version": "1.0", "description": "Install complete"}),
            json!({"revision": 2, "updated": "t2", "status": "deployed", "chart": "app-1.1.0", "app_version": "1.1", "description": "Upgrade complete"}),
        ];

        let text = format_release_history("app", &history, 10);
        let rev2 = text.find("## Revision 2").unwrap();
        let rev1 = text.find("## Revision 1").unwrap();
        assert!(rev2 < rev1);
    }

    #[test]
    fn pod_health_reports_waiting_containers() {
        let pods = json!({
            "items": [{
                "metadata": {"name": "api-0"},
                "status": {
                    "phase": "Pending",
                    "containerStatuses": [{
                        "name": "api",
                        "ready": false,
                        "restartCount": 4,
                        "state": {"waiting": {"reason": "CrashLoopBackOff", "message": "back-off 40s"}}
                    }]
                }
            }]
        });

        let text = format_pod_health(&pods);
        assert!(text.contains("- **api-0:** Pending"));
        assert!(text.contains("Ready=false, Restarts=4"));
        assert!(text.contains("**Issue:** CrashLoopBackOff - back-off 40s"));
    }
}
