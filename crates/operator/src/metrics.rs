use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ALERTS_RECEIVED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "rca_alerts_received_total",
        "Total number of alerts received in webhook batches."
    ))
    .unwrap();
    pub static ref ALERTS_DEDUPLICATED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "rca_alerts_deduplicated_total",
        "Total number of firing alerts suppressed as duplicates."
    ))
    .unwrap();
    pub static ref DEDUP_EVICTIONS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "rca_dedup_evictions_total",
        "Total number of entries evicted from the dedup cache."
    ))
    .unwrap();
    pub static ref INVESTIGATIONS_TRIGGERED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "rca_investigations_triggered_total",
        "Total number of investigations accepted by the agent."
    ))
    .unwrap();
    pub static ref INVESTIGATIONS_FAILED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "rca_investigations_failed_total",
        "Total number of investigations that errored or timed out."
    ))
    .unwrap();
}

pub fn register_metrics() {
    for collector in [
        &*ALERTS_RECEIVED_TOTAL,
        &*ALERTS_DEDUPLICATED_TOTAL,
        &*DEDUP_EVICTIONS_TOTAL,
        &*INVESTIGATIONS_TRIGGERED_TOTAL,
        &*INVESTIGATIONS_FAILED_TOTAL,
    ] {
        REGISTRY
            .register(Box::new(collector.clone()))
            .expect("Failed to register metric");
    }
}

pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}
