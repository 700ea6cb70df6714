// ABOUTME: Prometheus metrics for HTTP routes, status changes, and the notification relay
// ABOUTME: Thin wrappers over the metrics facade so call sites stay one-liners

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
/// Fails if a recorder is already installed in this process.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    metrics::describe_counter!(
        "agentline_http_requests_total",
        "HTTP requests by route and outcome"
    );
    metrics::describe_counter!(
        "agentline_status_changes_total",
        "Accepted agent status writes by new value"
    );
    metrics::describe_counter!(
        "agentline_relay_events_total",
        "Incoming-call events delivered to connections"
    );
    metrics::describe_counter!(
        "agentline_relay_transport_errors_total",
        "Event deliveries that failed because the connection was gone"
    );
    metrics::describe_counter!(
        "agentline_errors_total",
        "Errors by kind"
    );
    metrics::describe_gauge!(
        "agentline_relay_subscriptions",
        "Currently connected real-time clients"
    );

    Ok(handle)
}

pub fn record_http_request(route: &'static str, outcome: &'static str) {
    metrics::counter!("agentline_http_requests_total", "route" => route, "outcome" => outcome)
        .increment(1);
}

pub fn record_status_change(status: &'static str) {
    metrics::counter!("agentline_status_changes_total", "status" => status).increment(1);
}

pub fn record_event_emitted() {
    metrics::counter!("agentline_relay_events_total").increment(1);
}

pub fn record_transport_error() {
    metrics::counter!("agentline_relay_transport_errors_total").increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("agentline_errors_total", "kind" => kind).increment(1);
}

pub fn record_subscription_opened() {
    metrics::gauge!("agentline_relay_subscriptions").increment(1.0);
}

pub fn record_subscription_closed() {
    metrics::gauge!("agentline_relay_subscriptions").decrement(1.0);
}
