use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::claims;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Query;
use crate::handlers::audit;
use crate::middleware::AdminContext;
use crate::models::{ActorType, BonusClaim, ClaimStatus, Receipt};
use crate::pagination::{Paged, PaginationParams};

#[derive(Deserialize, Default)]
pub struct ListClaimsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<String>,
}

/// GET /admin/claims - review queue, filterable by status.
pub async fn list_claims(
    State(state): State<AppState>,
    Query(params): Query<ListClaimsParams>,
) -> Result<axum::Json<Paged<BonusClaim>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            s.parse::<ClaimStatus>()
                .map_err(|_| AppError::BadRequest(format!("Unknown claim status: {}", s)))
        })
        .transpose()?;

    let (limit, offset) = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    }
    .clamp();
    let conn = state.db.get()?;
    let (claims, total) = queries::list_claims_paginated(&conn, status, limit, offset)?;

    Ok(axum::Json(Paged::new(claims, total, limit, offset)))
}

#[derive(Serialize)]
pub struct ClaimDetail {
    pub claim: BonusClaim,
    /// The linked receipt, so a reviewer sees both in one fetch.
    pub receipt: Option<Receipt>,
}

/// GET /admin/claims/{claim_id} - claim plus its receipt.
pub async fn get_claim_detail(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
) -> Result<axum::Json<ClaimDetail>> {
    let conn = state.db.get()?;
    let claim = queries::get_claim_by_id(&conn, &claim_id)?
        .ok_or_else(|| AppError::NotFound("Claim not found".into()))?;
    let receipt = queries::get_receipt_by_id(&conn, &claim.receipt_id)?;
    Ok(axum::Json(ClaimDetail { claim, receipt }))
}

/// POST /admin/claims/{claim_id}/approve
///
/// Requires the linked receipt to be verified; grants the pre-order bonus
/// entitlement atomically with the status change.
pub async fn approve_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Path(claim_id): Path<String>,
) -> Result<axum::Json<BonusClaim>> {
    let mut conn = state.db.get()?;
    let claim = claims::approve_claim(&mut conn, &claim_id)?;

    tracing::info!(admin_id = %ctx.admin.id, claim_id = %claim.id, "Claim approved");
    audit(
        &state,
        &headers,
        ActorType::Admin,
        Some(&ctx.admin.id),
        "claim.approve",
        "bonus_claim",
        &claim.id,
        None,
    );

    Ok(axum::Json(claim))
}

#[derive(Serialize)]
pub struct ClaimDownloadLinkResponse {
    pub claim: BonusClaim,
    pub url: String,
    pub expires_at: i64,
}

/// POST /admin/claims/{claim_id}/link
///
/// Mint the signed charter-pack download link for an approved (or already
/// delivered) claim, ready to email to the delivery address. Re-linking a
/// delivered claim just issues a fresh token; the claim state is untouched.
/// Answers 409 for pending or rejected claims and 503 when no signing
/// secret is configured.
pub async fn link_claim_download(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Path(claim_id): Path<String>,
) -> Result<axum::Json<ClaimDownloadLinkResponse>> {
    let conn = state.db.get()?;
    let link = claims::issue_download_link(
        &conn,
        state.download_token_secret.as_deref(),
        &claim_id,
    )?;

    tracing::info!(admin_id = %ctx.admin.id, claim_id = %link.claim.id, "Download link minted");
    audit(
        &state,
        &headers,
        ActorType::Admin,
        Some(&ctx.admin.id),
        "claim.link",
        "bonus_claim",
        &link.claim.id,
        Some(serde_json::json!({ "asset_id": link.asset_id })),
    );

    Ok(axum::Json(ClaimDownloadLinkResponse {
        url: format!(
            "{}/assets/{}?token={}",
            state.base_url, link.asset_id, link.token
        ),
        expires_at: link.expires_at,
        claim: link.claim,
    }))
}

/// POST /admin/claims/{claim_id}/reject
pub async fn reject_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Path(claim_id): Path<String>,
) -> Result<axum::Json<BonusClaim>> {
    let conn = state.db.get()?;
    let claim = claims::reject_claim(&conn, &claim_id)?;

    audit(
        &state,
        &headers,
        ActorType::Admin,
        Some(&ctx.admin.id),
        "claim.reject",
        "bonus_claim",
        &claim.id,
        None,
    );

    Ok(axum::Json(claim))
}
