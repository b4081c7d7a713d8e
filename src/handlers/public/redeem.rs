use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::db::AppState;
use crate::extractors::Json;
use crate::handlers::audit;
use crate::middleware::Identity;
use crate::models::ActorType;
use crate::redemption::{self, RedeemError, Redemption};

#[derive(Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

/// POST /redeem - redeem a VIP code for the authenticated user.
///
/// Refusals are classified (format, invalid, expired, already redeemed)
/// but unknown and revoked codes share one answer, so the endpoint leaks
/// nothing about which strings are live codes.
pub async fn redeem_code(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    Json(req): Json<RedeemRequest>,
) -> Result<(StatusCode, axum::Json<Redemption>), RedeemError> {
    let mut conn = state.db.get().map_err(crate::error::AppError::from)?;
    let redemption = redemption::redeem(&mut conn, &identity.user.id, &req.code)?;

    tracing::info!(
        user_id = %identity.user.id,
        entitlement_id = %redemption.entitlement.id,
        code_type = %redemption.code_type.as_str(),
        "Code redeemed"
    );
    audit(
        &state,
        &headers,
        ActorType::Public,
        Some(&identity.user.id),
        "code.redeem",
        "entitlement",
        &redemption.entitlement.id,
        Some(serde_json::json!({
            "code_id": redemption.entitlement.code_id,
            "code_type": redemption.code_type.as_str(),
        })),
    );

    Ok((StatusCode::CREATED, axum::Json(redemption)))
}
