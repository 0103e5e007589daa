use std::sync::Arc;
use tracing::{info, warn};

use rca_operator::{
    agent::{tools::memory::MemoryStore, AgentClient},
    config::Config,
    dedup::DedupCache,
    metrics,
    notifier::Notifier,
    server::Server,
    sources::WebhookHandler,
    Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config.server);
    info!("Agent endpoint: {}", config.agent.endpoint);

    metrics::register_metrics();

    // The dedup cache is the only shared mutable state; it is owned here
    // and injected into the controller.
    let cache = Arc::new(DedupCache::new());
    let agent = Arc::new(AgentClient::new(&config.agent)?);
    let webhook = Arc::new(WebhookHandler::new(cache, agent));

    let notifier = if config.notifier.is_configured() {
        Some(Arc::new(Notifier::new(config.notifier.clone())?))
    } else {
        warn!("SMTP credentials not configured; notification endpoint disabled");
        None
    };

    let memory = Arc::new(MemoryStore::new(config.memory.root.clone()));

    let server = Server::new(webhook, notifier, memory);

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await
}
