mod assets;
mod claims;
mod entitlements;
mod redeem;

pub use assets::*;
pub use claims::*;
pub use entitlements::*;
pub use redeem::*;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(limits: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .layer(rate_limit::relaxed_layer(limits.relaxed_rpm))
        .merge(
            // Endpoints that accept guessable or reviewed input get the
            // tightest limit: code guesses and claim submissions.
            Router::new()
                .route("/redeem", post(redeem_code))
                .route("/claims", post(submit_claim))
                .layer(rate_limit::strict_layer(limits.strict_rpm)),
        )
        .merge(
            Router::new()
                .route("/entitlements", get(get_entitlements))
                .route("/claims/{claim_id}", get(get_claim))
                .route("/assets/{asset_id}", get(download_asset))
                .layer(rate_limit::standard_layer(limits.standard_rpm)),
        )
}
