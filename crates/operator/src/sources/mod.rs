pub mod webhook;

pub use webhook::{AlertmanagerAlert, AlertmanagerWebhook, WebhookHandler, WebhookResponse};
