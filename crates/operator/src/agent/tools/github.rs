//! GitHub inspector.
//!
//! Correlates alerts with recent source changes: commits, workflow runs and
//! repository metadata via the GitHub REST API. Works anonymously (subject
//! to rate limits) when no token is configured.

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::{ToolError, ToolResult};

const API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum GithubAction {
    RecentCommits {
        owner: String,
        repo: String,
        branch: String,
        limit: usize,
        since_hours: Option<i64>,
    },
    CommitDetails {
        owner: String,
        repo: String,
        commit_sha: String,
    },
    WorkflowRuns {
        owner: String,
        repo: String,
        branch: Option<String>,
        limit: usize,
    },
    FailedWorkflows {
        owner: String,
        repo: String,
        limit: usize,
    },
    CheckRepo {
        owner: String,
        repo: String,
    },
}

pub struct GithubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Build a client from the `GITHUB_TOKEN` environment variable.
    pub fn from_env() -> std::result::Result<Self, ToolError> {
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        Self::new(token)
    }

    pub fn new(token: Option<String>) -> std::result::Result<Self, ToolError> {
        if token.is_none() {
            warn!("No GitHub token configured; using anonymous rate-limited access");
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("rca-operator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            token,
        })
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn run(&self, action: GithubAction) -> ToolResult {
        match action {
            GithubAction::RecentCommits {
                owner,
                repo,
                branch,
                limit,
                since_hours,
            } => self.recent_commits(&owner, &repo, &branch, limit, since_hours).await,
            GithubAction::CommitDetails {
                owner,
                repo,
                commit_sha,
            } => self.commit_details(&owner, &repo, &commit_sha).await,
            GithubAction::WorkflowRuns {
                owner,
                repo,
                branch,
                limit,
            } => self.workflow_runs(&owner, &repo, branch.as_deref(), limit).await,
            GithubAction::FailedWorkflows { owner, repo, limit } => {
                self.failed_workflows(&owner, &repo, limit).await
            }
            GithubAction::CheckRepo { owner, repo } => self.check_repo(&owner, &repo).await,
        }
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, ToolError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200 => response
                .json::<Value>()
                .await
                .map_err(|e| ToolError::Parse(e.to_string())),
            401 => Err(ToolError::Auth(
                "GitHub API authentication failed, check GITHUB_TOKEN".to_string(),
            )),
            403 => Err(ToolError::Forbidden(path.to_string())),
            404 => Err(ToolError::NotFound(path.to_string())),
            _ => Err(ToolError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn recent_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        limit: usize,
        since_hours: Option<i64>,
    ) -> ToolResult {
        let mut query = vec![
            ("sha", branch.to_string()),
            ("per_page", limit.to_string()),
        ];
        if let Some(hours) = since_hours {
            let since = Utc::now() - ChronoDuration::hours(hours);
            query.push(("since", since.to_rfc3339()));
        }

        let data = self.get(&format!("/repos/{owner}/{repo}/commits"), &query).await?;
        let commits = data.as_array().cloned().unwrap_or_default();

        if commits.is_empty() {
            return Ok(format!("No commits found in {owner}/{repo} on branch {branch}"));
        }
        Ok(format_commits(owner, repo, branch, &commits))
    }

    async fn commit_details(&self, owner: &str, repo: &str, commit_sha: &str) -> ToolResult {
        let data = self
            .get(&format!("/repos/{owner}/{repo}/commits/{commit_sha}"), &[])
            .await?;
        Ok(format_commit_details(owner, repo, commit_sha, &data))
    }

    async fn workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        limit: usize,
    ) -> ToolResult {
        let mut query = vec![("per_page", limit.to_string())];
        if let Some(branch) = branch {
            query.push(("branch", branch.to_string()));
        }

        let data = self
            .get(&format!("/repos/{owner}/{repo}/actions/runs"), &query)
            .await?;
        let runs = data["workflow_runs"].as_array().cloned().unwrap_or_default();

        if runs.is_empty() {
            return Ok(format!("No workflow runs found in {owner}/{repo}"));
        }
        Ok(format_workflow_runs(owner, repo, &runs))
    }

    async fn failed_workflows(&self, owner: &str, repo: &str, limit: usize) -> ToolResult {
        // Fetch a wider window of completed runs, then filter for failures.
        let query = vec![
            ("status", "completed".to_string()),
            ("per_page", "50".to_string()),
        ];
        let data = self
            .get(&format!("/repos/{owner}/{repo}/actions/runs"), &query)
            .await?;
        let runs = data["workflow_runs"].as_array().cloned().unwrap_or_default();

        let failed: Vec<Value> = runs
            .into_iter()
            .filter(|r| {
                matches!(
                    r["conclusion"].as_str(),
                    Some("failure") | Some("timed_out") | Some("cancelled")
                )
            })
            .take(limit)
            .collect();

        if failed.is_empty() {
            return Ok(format!(
                "No failed workflow runs found in {owner}/{repo} (recent runs all successful)"
            ));
        }
        Ok(format_failed_workflows(owner, repo, &failed))
    }

    async fn check_repo(&self, owner: &str, repo: &str) -> ToolResult {
        let data = self.get(&format!("/repos/{owner}/{repo}"), &[]).await?;

        let mut result = format!("# Repository: {owner}/{repo}\n\n");
        result.push_str(&format!(
            "**Full Name:** {}\n",
            data["full_name"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "**Description:** {}\n",
            data["description"].as_str().unwrap_or("No description")
        ));
        result.push_str(&format!(
            "**Default Branch:** {}\n",
            data["default_branch"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!("**Private:** {}\n", data["private"]));
        result.push_str(&format!(
            "**Language:** {}\n",
            data["language"].as_str().unwrap_or("N/A")
        ));
        result.push_str(&format!(
            "**URL:** {}\n",
            data["html_url"].as_str().unwrap_or("unknown")
        ));
        Ok(result)
    }
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

fn format_commits(owner: &str, repo: &str, branch: &str, commits: &[Value]) -> String {
    let mut result = format!("# Recent Commits: {owner}/{repo} (branch: {branch})\n\n");
    result.push_str(&format!("Showing {} commit(s):\n\n", commits.len()));

    for commit in commits {
        let sha = commit["sha"].as_str().unwrap_or("unknown");
        let message = commit["commit"]["message"]
            .as_str()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("");
        let author = commit["commit"]["author"]["name"].as_str().unwrap_or("unknown");
        let date = commit["commit"]["author"]["date"].as_str().unwrap_or("unknown");
        let url = commit["html_url"].as_str().unwrap_or("");

        result.push_str(&format!("- **{}** - {message}\n", short_sha(sha)));
        result.push_str(&format!("  - Author: {author}\n"));
        result.push_str(&format!("  - Date: {date}\n"));
        result.push_str(&format!("  - URL: {url}\n\n"));
    }
    result
}

fn format_commit_details(owner: &str, repo: &str, commit_sha: &str, data: &Value) -> String {
    let mut result = format!("# Commit Details: {}\n\n", short_sha(commit_sha));
    result.push_str(&format!("**Repository:** {owner}/{repo}\n"));
    result.push_str(&format!(
        "**Author:** {} <{}>\n",
        data["commit"]["author"]["name"].as_str().unwrap_or("unknown"),
        data["commit"]["author"]["email"].as_str().unwrap_or("unknown")
    ));
    result.push_str(&format!(
        "**Date:** {}\n",
        data["commit"]["author"]["date"].as_str().unwrap_or("unknown")
    ));
    result.push_str(&format!(
        "**Message:**\n```\n{}\n```\n\n",
        data["commit"]["message"].as_str().unwrap_or("")
    ));

    let files = data["files"].as_array().cloned().unwrap_or_default();
    if !files.is_empty() {
        result.push_str(&format!("**Files Changed ({}):**\n", files.len()));
        for file in files.iter().take(20) {
            result.push_str(&format!(
                "- [{}] {} (+{}/-{})\n",
                file["status"].as_str().unwrap_or("unknown"),
                file["filename"].as_str().unwrap_or("unknown"),
                file["additions"].as_u64().unwrap_or(0),
                file["deletions"].as_u64().unwrap_or(0)
            ));
        }
        if files.len() > 20 {
            result.push_str(&format!("- ... and {} more files\n", files.len() - 20));
        }
    }

    result.push_str(&format!(
        "\n**URL:** {}\n",
        data["html_url"].as_str().unwrap_or("unknown")
    ));
    result
}

fn format_workflow_runs(owner: &str, repo: &str, runs: &[Value]) -> String {
    let mut result = format!("# GitHub Actions Workflow Runs: {owner}/{repo}\n\n");
    result.push_str(&format!("Showing {} run(s):\n\n", runs.len()));

    for run in runs {
        let status = run["status"].as_str().unwrap_or("unknown");
        let conclusion = run["conclusion"].as_str();
        let marker = match (status, conclusion) {
            ("completed", Some("success")) => "✓",
            ("completed", _) => "✗",
            ("in_progress", _) => "~",
            _ => "?",
        };

        result.push_str(&format!(
            "## {marker} {} (Run #{})\n",
            run["name"].as_str().unwrap_or("unknown"),
            run["id"]
        ));
        result.push_str(&format!("- **Status:** {status}\n"));
        if let Some(conclusion) = conclusion {
            result.push_str(&format!("- **Conclusion:** {conclusion}\n"));
        }
        result.push_str(&format!(
            "- **Branch:** {}\n",
            run["head_branch"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Commit:** {}\n",
            short_sha(run["head_sha"].as_str().unwrap_or("unknown"))
        ));
        result.push_str(&format!(
            "- **Created:** {}\n",
            run["created_at"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **URL:** {}\n\n",
            run["html_url"].as_str().unwrap_or("unknown")
        ));
    }
    result
}

fn format_failed_workflows(owner: &str, repo: &str, failed: &[Value]) -> String {
    let mut result = format!("# Failed GitHub Actions Workflows: {owner}/{repo}\n\n");
    result.push_str(&format!("Showing {} failed run(s):\n\n", failed.len()));

    for run in failed {
        result.push_str(&format!(
            "## ✗ {}\n",
            run["name"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Conclusion:** {}\n",
            run["conclusion"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Branch:** {}\n",
            run["head_branch"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **Commit:** {}\n",
            short_sha(run["head_sha"].as_str().unwrap_or("unknown"))
        ));
        result.push_str(&format!(
            "- **Time:** {}\n",
            run["created_at"].as_str().unwrap_or("unknown")
        ));
        result.push_str(&format!(
            "- **URL:** {}\n\n",
            run["html_url"].as_str().unwrap_or("unknown")
        ));
    }
    result
}
