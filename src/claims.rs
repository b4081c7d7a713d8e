//! Pre-order bonus claim workflow: submission, human review, signed
//! download links, and the delivery transition that rides on the first
//! authorized download.

use chrono::Utc;
use rusqlite::Connection;

use crate::assets::{get_asset, Asset, ASSET_AGENT_CHARTER_PACK};
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{BonusClaim, ClaimStatus, CreateBonusClaim, Receipt};
use crate::token::{self, TokenError, TOKEN_TTL_SECS};

/// Submit a new claim with its proof-of-purchase receipt.
///
/// One open claim per user: a pending, approved or delivered claim blocks
/// resubmission. A rejected claim does not; the user may try again with a
/// better receipt.
pub fn submit_claim(
    conn: &mut Connection,
    user_id: &str,
    input: &CreateBonusClaim,
) -> Result<(BonusClaim, Receipt)> {
    let email = input.delivery_email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest(
            "A valid delivery email is required".into(),
        ));
    }
    let receipt_ref = input.receipt_ref.trim();
    if receipt_ref.is_empty() {
        return Err(AppError::BadRequest(
            "A receipt upload reference is required".into(),
        ));
    }

    let existing = queries::list_claims_for_user(conn, user_id)?;
    if existing.iter().any(|c| c.status != ClaimStatus::Rejected) {
        return Err(AppError::Conflict(
            "A bonus claim already exists for this account".into(),
        ));
    }

    queries::create_claim(conn, user_id, email, receipt_ref)
}

/// Approve a pending claim. The linked receipt must already be verified;
/// approval grants the pre-order bonus entitlement in the same transaction.
pub fn approve_claim(conn: &mut Connection, claim_id: &str) -> Result<BonusClaim> {
    match queries::approve_claim_atomic(conn, claim_id)? {
        Some((claim, _entitlement)) => Ok(claim),
        None => match queries::get_claim_by_id(conn, claim_id)? {
            Some(claim) => Err(AppError::Conflict(format!(
                "Claim is {} and cannot be approved",
                claim.status.as_str()
            ))),
            None => Err(AppError::NotFound("Claim not found".into())),
        },
    }
}

/// Reject a pending claim. Terminal.
pub fn reject_claim(conn: &Connection, claim_id: &str) -> Result<BonusClaim> {
    if queries::reject_claim(conn, claim_id)? {
        queries::get_claim_by_id(conn, claim_id)?
            .ok_or_else(|| AppError::NotFound("Claim not found".into()))
    } else {
        match queries::get_claim_by_id(conn, claim_id)? {
            Some(claim) => Err(AppError::Conflict(format!(
                "Claim is {} and cannot be rejected",
                claim.status.as_str()
            ))),
            None => Err(AppError::NotFound("Claim not found".into())),
        }
    }
}

/// A minted download link for a claim, ready to send to the delivery email.
#[derive(Debug)]
pub struct ClaimDownloadLink {
    pub claim: BonusClaim,
    pub asset_id: &'static str,
    pub token: String,
    pub expires_at: i64,
}

/// Mint a signed charter-pack download token for an approved (or already
/// delivered) claim. The token embeds the claim id and delivery email, so
/// the link keeps working after the recipient forwards it, but dies with
/// the claim if review later reverses.
pub fn issue_download_link(
    conn: &Connection,
    secret: Option<&str>,
    claim_id: &str,
) -> Result<ClaimDownloadLink> {
    let claim = queries::get_claim_by_id(conn, claim_id)?
        .ok_or_else(|| AppError::NotFound("Claim not found".into()))?;
    if !claim.status.allows_download() {
        return Err(AppError::Conflict(format!(
            "Claim is {} and has no download to link",
            claim.status.as_str()
        )));
    }

    let token = token::issue_token(
        secret,
        &claim.id,
        &claim.delivery_email,
        ASSET_AGENT_CHARTER_PACK,
    )
    .map_err(|e| match e {
        TokenError::MissingSecret => AppError::DownloadsUnavailable,
        other => AppError::Internal(other.to_string()),
    })?;

    Ok(ClaimDownloadLink {
        claim,
        asset_id: ASSET_AGENT_CHARTER_PACK,
        token,
        expires_at: Utc::now().timestamp() + TOKEN_TTL_SECS,
    })
}

/// Authorize a download against a signed token and return the asset.
///
/// Verification order is fixed: token first (structure, signature, expiry,
/// asset scope), then the claim it names is re-read from current state. A
/// still-valid token is defeated by a claim that is no longer approved or
/// delivered; a pasted link cannot outlive a reversed review. The first
/// authorized download flips an approved claim to delivered; repeat
/// downloads see the delivered claim and leave `delivered_at` untouched.
pub fn authorize_download(
    conn: &Connection,
    secret: Option<&str>,
    token_str: &str,
    asset_id: &str,
) -> std::result::Result<&'static Asset, DownloadError> {
    let asset = get_asset(asset_id).ok_or(DownloadError::UnknownAsset)?;
    let now = Utc::now().timestamp();

    let verified = token::verify_token(secret, token_str, asset.id, now)?;

    let claim = queries::get_claim_by_id(conn, &verified.claim_id)?
        .ok_or(DownloadError::ClaimNotAuthorized)?;
    if !claim.status.allows_download() {
        return Err(DownloadError::ClaimNotAuthorized);
    }

    if claim.status == ClaimStatus::Approved {
        queries::try_mark_claim_delivered(conn, &claim.id)?;
        tracing::info!(claim_id = %claim.id, "Bonus claim delivered");
    }

    Ok(asset)
}

/// Why a download was refused.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Asset not found")]
    UnknownAsset,
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Token verified but the claim behind it is missing, still pending, or
    /// was rejected since the link was minted.
    #[error("This claim does not authorize downloads")]
    ClaimNotAuthorized,
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl axum::response::IntoResponse for DownloadError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let message = self.to_string();
        let (status, message) = match self {
            Self::UnknownAsset => (StatusCode::NOT_FOUND, message),
            Self::Token(TokenError::MissingSecret) => {
                return AppError::DownloadsUnavailable.into_response()
            }
            Self::Token(TokenError::Expired) => (StatusCode::GONE, message),
            Self::Token(_) => (StatusCode::UNAUTHORIZED, "Invalid download token".to_string()),
            Self::ClaimNotAuthorized => (StatusCode::FORBIDDEN, message),
            Self::Storage(e) => return e.into_response(),
        };

        (
            status,
            axum::Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}
