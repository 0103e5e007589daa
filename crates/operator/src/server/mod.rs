mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{agent::tools::memory::MemoryStore, notifier::Notifier, sources::WebhookHandler};

pub struct AppState {
    pub webhook: Arc<WebhookHandler>,
    pub notifier: Option<Arc<Notifier>>,
    pub memory: Arc<MemoryStore>,
}

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(
        webhook: Arc<WebhookHandler>,
        notifier: Option<Arc<Notifier>>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            state: AppState {
                webhook,
                notifier,
                memory,
            },
        }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self.state);

        Router::new()
            .route("/", get(routes::root))
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route("/api/v1/webhook/alertmanager", post(routes::alertmanager_webhook))
            .route("/api/v1/webhook/test", post(routes::test_webhook))
            .route("/api/v1/notify", post(routes::notify))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
