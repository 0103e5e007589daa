use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub notifier: NotifierConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Downstream investigation agent endpoint. Accepts `POST {"prompt": ...}`.
    pub endpoint: String,
    /// Hard per-invocation timeout in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub smtp_from: String,
    pub recipients: SeverityRoutes,
}

/// Recipient lists per recognized severity. Unrecognized severities fall
/// back to the warning list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityRoutes {
    pub critical: Vec<String>,
    pub warning: Vec<String>,
    pub info: Vec<String>,
}

impl SeverityRoutes {
    pub fn for_severity(&self, severity: &str) -> &[String] {
        match severity.to_lowercase().as_str() {
            "critical" => &self.critical,
            "warning" => &self.warning,
            "info" => &self.info,
            _ => &self.warning,
        }
    }

    pub fn is_recognized(severity: &str) -> bool {
        matches!(severity.to_lowercase().as_str(), "critical" | "warning" | "info")
    }

    pub fn is_empty(&self) -> bool {
        self.critical.is_empty() && self.warning.is_empty() && self.info.is_empty()
    }
}

impl NotifierConfig {
    /// The notifier is active only when SMTP credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.smtp_user.is_empty() && !self.smtp_password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Root directory of the markdown knowledge base.
    pub root: PathBuf,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR")
                    .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            },
            agent: AgentConfig {
                endpoint: std::env::var("AGENT_ENDPOINT").unwrap_or_else(|_| {
                    "http://rca-agent.agents.svc.cluster.local/api/v1/invoke".to_string()
                }),
                timeout_secs: std::env::var("AGENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            },
            notifier: NotifierConfig {
                smtp_host: std::env::var("SMTP_HOST")
                    .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                smtp_port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(587),
                smtp_user: std::env::var("SMTP_USER").unwrap_or_default(),
                smtp_password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                smtp_from: std::env::var("SMTP_FROM")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| std::env::var("SMTP_USER").unwrap_or_default()),
                recipients: SeverityRoutes {
                    critical: recipient_list("RECIPIENTS_CRITICAL"),
                    warning: recipient_list("RECIPIENTS_WARNING"),
                    info: recipient_list("RECIPIENTS_INFO"),
                },
            },
            memory: MemoryConfig {
                root: std::env::var("MEMORY_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/agent-memory")),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.agent.endpoint.is_empty() {
            return Err(crate::Error::Config("AGENT_ENDPOINT must not be empty".to_string()));
        }
        Url::parse(&self.agent.endpoint).map_err(|e| {
            crate::Error::Config(format!("AGENT_ENDPOINT is not a valid URL: {e}"))
        })?;
        if self.agent.timeout_secs == 0 {
            return Err(crate::Error::Config(
                "AGENT_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        if self.notifier.is_configured() && self.notifier.recipients.is_empty() {
            tracing::warn!(
                "SMTP credentials are set but no recipients are configured. \
                 Set RECIPIENTS_CRITICAL, RECIPIENTS_WARNING, or RECIPIENTS_INFO."
            );
        }
        Ok(())
    }
}

fn recipient_list(var: &str) -> Vec<String> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            agent: AgentConfig {
                endpoint: "http://rca-agent.agents.svc.cluster.local/api/v1/invoke".to_string(),
                timeout_secs: 300,
            },
            notifier: NotifierConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                smtp_user: String::new(),
                smtp_password: String::new(),
                smtp_from: String::new(),
                recipients: SeverityRoutes::default(),
            },
            memory: MemoryConfig {
                root: PathBuf::from("/agent-memory"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_routing_matches_known_levels() {
        let routes = SeverityRoutes {
            critical: vec!["oncall@example.com".to_string()],
            warning: vec!["team@example.com".to_string()],
            info: vec!["digest@example.com".to_string()],
        };

        assert_eq!(routes.for_severity("critical"), ["oncall@example.com"]);
        assert_eq!(routes.for_severity("CRITICAL"), ["oncall@example.com"]);
        assert_eq!(routes.for_severity("info"), ["digest@example.com"]);
    }

    #[test]
    fn unrecognized_severity_falls_back_to_warning() {
        let routes = SeverityRoutes {
            critical: vec!["oncall@example.com".to_string()],
            warning: vec!["team@example.com".to_string()],
            info: vec![],
        };

        assert_eq!(routes.for_severity("page-me-now"), ["team@example.com"]);
        assert!(!SeverityRoutes::is_recognized("page-me-now"));
        assert!(SeverityRoutes::is_recognized("Warning"));
    }

    #[test]
    fn invalid_agent_endpoint_fails_validation() {
        let mut config = Config::default();
        config.agent.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());

        config.agent.endpoint = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn notifier_requires_both_credentials() {
        let mut config = Config::default();
        assert!(!config.notifier.is_configured());

        config.notifier.smtp_user = "bot@example.com".to_string();
        assert!(!config.notifier.is_configured());

        config.notifier.smtp_password = "app-password".to_string();
        assert!(config.notifier.is_configured());
    }
}
