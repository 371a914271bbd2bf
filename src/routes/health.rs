//! Relay status endpoint
//!
//! Reports which reader the relay talks to and the defaults a rip started
//! through it would use.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RelayStatus {
    pub status: &'static str,
    pub version: &'static str,
    /// Login and pager host
    pub vendor: String,
    /// Host serving SVG overlays and backgrounds
    pub content: String,
    pub concurrency: usize,
    pub quality: u8,
}

pub async fn relay_status(State(state): State<AppState>) -> Json<RelayStatus> {
    let client = state.client();
    let rip = &state.config().rip;

    Json(RelayStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        vendor: client.vendor_base().to_string(),
        content: client.content_base().to_string(),
        concurrency: rip.effective_concurrency(),
        quality: rip.quality,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(relay_status))
}
