use axum::{extract::State, Json};
use chrono::Utc;
use http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::AppState;
use crate::metrics::gather_metrics;
use crate::notifier::{NotifyRequest, NotifySummary};
use crate::sources::webhook::{AlertmanagerWebhook, WebhookResponse};

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "rca-operator",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "alertmanager_webhook": "/api/v1/webhook/alertmanager",
            "test_webhook": "/api/v1/webhook/test",
            "notify": "/api/v1/notify",
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "rca-operator",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics() -> String {
    gather_metrics()
}

/// Main webhook endpoint. A syntactically valid batch always gets a 200
/// aggregate, even when every contained alert failed downstream; malformed
/// envelopes are rejected by the Json extractor before processing starts.
pub async fn alertmanager_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AlertmanagerWebhook>,
) -> Json<WebhookResponse> {
    Json(state.webhook.process(payload).await)
}

/// Manual test endpoint: echoes any JSON body.
pub async fn test_webhook(Json(body): Json<Value>) -> Json<Value> {
    info!("Test webhook received: {body}");
    Json(json!({
        "status": "test_received",
        "timestamp": Utc::now().to_rfc3339(),
        "data": body,
    }))
}

pub async fn notify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<NotifySummary>, (StatusCode, Json<Value>)> {
    let Some(notifier) = &state.notifier else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "notifier is not configured" })),
        ));
    };

    match notifier.send_report(&request).await {
        Ok(summary) => {
            // Keep a copy of the delivered report in the knowledge base;
            // delivery already succeeded, so a write failure is log-only.
            if let Err(e) = state
                .memory
                .save_report(&request.alert_name, &request.report_markdown)
            {
                warn!("Failed to archive incident report: {e}");
            }
            Ok(Json(summary))
        }
        Err(e) => {
            error!("Failed to send notification: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}
