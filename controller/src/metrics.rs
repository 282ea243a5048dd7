//! Prometheus counters for calendar fetches, served on `/metrics`.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::shutdown::Shutdown;

/// Label used when a fetch never produced an HTTP status.
pub const STATUS_TRANSPORT: &str = "transport";

/// Calendar fetches by HTTP status code
pub static FETCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "alarmclock_fetch_total",
        "Calendar fetches by response status",
        &["status"]
    )
    .expect("alarmclock_fetch_total is registered once")
});

/// Calendar fetches that hit the client timeout
pub static FETCH_TIMEOUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "alarmclock_fetch_timeouts_total",
        "Calendar fetches that timed out"
    )
    .expect("alarmclock_fetch_timeouts_total is registered once")
});

pub fn record_fetch(status: &str) {
    FETCH_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_timeout() {
    FETCH_TIMEOUTS_TOTAL.inc();
}

pub fn encode_metrics() -> anyhow::Result<String> {
    Lazy::force(&FETCH_TOTAL);
    Lazy::force(&FETCH_TIMEOUTS_TOTAL);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .context("failed to encode metrics")?;
    Ok(String::from_utf8(buffer)?)
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(handle_metrics))
}

async fn handle_metrics() -> Response {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder_content_type())],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")).into_response(),
    }
}

fn encoder_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

pub async fn serve(port: u16, shutdown: Shutdown) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics server at {addr}"))?;

    info!("metrics listening on http://{addr}/metrics");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await?;
    Ok(())
}
