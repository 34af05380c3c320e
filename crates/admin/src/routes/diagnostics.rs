//! On-demand self-test.

use axum::{Json, Router, extract::State, routing::post};
use tracing::warn;

use crate::middleware::RequireAdmin;
use crate::services::{DiagnosticReport, DiagnosticRunner};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/diagnostics/run", post(run))
}

/// Failed checks are reported in the body; the request itself succeeds.
async fn run(_admin: RequireAdmin, State(state): State<AppState>) -> Json<DiagnosticReport> {
    let report = DiagnosticRunner::builtin(state.pool()).run().await;
    if !report.all_passed() {
        warn!(stopped_early = report.stopped_early, "Diagnostics reported failures");
    }
    Json(report)
}
