use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::claims;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::handlers::audit;
use crate::middleware::Identity;
use crate::models::{ActorType, BonusClaim, CreateBonusClaim, Receipt};

#[derive(Serialize)]
pub struct ClaimResponse {
    pub claim: BonusClaim,
    pub receipt: Receipt,
}

/// POST /claims - submit a pre-order bonus claim with a receipt reference.
pub async fn submit_claim(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    Json(req): Json<CreateBonusClaim>,
) -> Result<(StatusCode, axum::Json<ClaimResponse>)> {
    let mut conn = state.db.get()?;
    let (claim, receipt) = claims::submit_claim(&mut conn, &identity.user.id, &req)?;

    tracing::info!(user_id = %identity.user.id, claim_id = %claim.id, "Bonus claim submitted");
    audit(
        &state,
        &headers,
        ActorType::Public,
        Some(&identity.user.id),
        "claim.submit",
        "bonus_claim",
        &claim.id,
        None,
    );

    Ok((
        StatusCode::CREATED,
        axum::Json(ClaimResponse { claim, receipt }),
    ))
}

/// GET /claims/{claim_id} - the user's own claim status.
/// Another user's claim id answers 404, not 403; ids are not probeable.
pub async fn get_claim(
    State(state): State<AppState>,
    identity: Identity,
    Path(claim_id): Path<String>,
) -> Result<axum::Json<BonusClaim>> {
    let conn = state.db.get()?;
    let claim = queries::get_claim_by_id(&conn, &claim_id)?
        .filter(|c| c.user_id == identity.user.id)
        .ok_or_else(|| AppError::NotFound("Claim not found".into()))?;
    Ok(axum::Json(claim))
}
