//! Prometheus metrics for the gateway.
//!
//! Tracks profile admission outcomes and per-mode request activity.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    /// Profile admission outcomes during registry load
    pub static ref ADMISSIONS_TOTAL: CounterVec = register_counter_vec!(
        "portico_admissions_total",
        "Interface profile admission outcomes",
        &["outcome"] // outcome: admitted|rejected
    )
    .unwrap();

    /// Requests served by the per-interface proxies
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "portico_requests_total",
        "Requests served, by behavior mode and outcome",
        &["mode", "outcome"] // mode: env|mock|mockerr, outcome: success|error
    )
    .unwrap();

    /// Inbound interceptions by response status
    pub static ref INTERCEPTIONS_TOTAL: CounterVec = register_counter_vec!(
        "portico_interceptions_total",
        "Intercepted inbound requests, by response status",
        &["status"]
    )
    .unwrap();
}

/// Render the default registry in the text exposition format.
pub fn exposition() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!("failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
