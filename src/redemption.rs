//! The redemption engine: normalize a user-entered code, classify why it
//! cannot be redeemed, or atomically consume one use and grant the
//! entitlement.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::queries;
use crate::error::AppError;
use crate::models::{Benefit, CodeStatus, CodeType, Entitlement, CODE_LENGTH};

/// Why a redemption attempt was refused.
///
/// The public messages deliberately do not distinguish revoked from
/// never-existed: both are "not valid", so the endpoint cannot be used to
/// probe which strings are live codes.
#[derive(Debug, Error)]
pub enum RedeemError {
    /// Input does not normalize to a 12-char uppercase alphanumeric code.
    #[error("Code format is invalid")]
    InvalidFormat,
    /// Unknown or revoked code.
    #[error("This code is not valid")]
    CodeInvalid,
    /// Validity window has closed.
    #[error("This code has expired")]
    CodeExpired,
    /// All redemptions consumed.
    #[error("This code has already been redeemed")]
    CodeAlreadyRedeemed,
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl From<rusqlite::Error> for RedeemError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.into())
    }
}

#[derive(Serialize)]
struct RedeemErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for RedeemError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error) = match self {
            Self::InvalidFormat => (StatusCode::BAD_REQUEST, "invalid_format"),
            Self::CodeInvalid => (StatusCode::NOT_FOUND, "code_invalid"),
            Self::CodeExpired => (StatusCode::GONE, "code_expired"),
            Self::CodeAlreadyRedeemed => (StatusCode::CONFLICT, "code_already_redeemed"),
            // Storage failures stay opaque; AppError logs and maps them
            Self::Storage(e) => return e.into_response(),
        };
        (status, Json(RedeemErrorBody { error, message })).into_response()
    }
}

/// A successful redemption.
#[derive(Debug, Serialize)]
pub struct Redemption {
    pub code_type: CodeType,
    pub entitlement: Entitlement,
    /// Benefits this redemption confers, for immediate UI display.
    pub benefits: &'static [Benefit],
}

/// Normalize user input to canonical code form: trim, drop separator
/// characters (`-` and spaces) that people add when reading codes off
/// print, uppercase.
pub fn normalize_code(input: &str) -> Result<String, RedeemError> {
    let normalized: String = input
        .trim()
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.len() != CODE_LENGTH
        || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(RedeemError::InvalidFormat);
    }
    Ok(normalized)
}

/// Redeem a code for a user.
///
/// Reads classify the refusal up front for precise errors, but the grant
/// itself rides entirely on the conditional update in
/// [`queries::redeem_code_atomic`]; a race lost between the read and the
/// update is re-classified from the code's post-race state, never granted.
pub fn redeem(
    conn: &mut Connection,
    user_id: &str,
    raw_code: &str,
) -> Result<Redemption, RedeemError> {
    let code_str = normalize_code(raw_code)?;
    let now = Utc::now().timestamp();

    let code = queries::get_code_by_code(conn, &code_str)?.ok_or(RedeemError::CodeInvalid)?;

    match code.status {
        CodeStatus::Revoked => return Err(RedeemError::CodeInvalid),
        CodeStatus::Expired => return Err(RedeemError::CodeExpired),
        CodeStatus::Redeemed => return Err(RedeemError::CodeAlreadyRedeemed),
        CodeStatus::Active => {}
    }

    if code.is_past_valid_until(now) {
        // Keep the stored status honest; the atomic guard would refuse anyway
        queries::mark_code_expired(conn, &code.id)?;
        return Err(RedeemError::CodeExpired);
    }

    let entitlement_type = code.code_type.entitlement_type();
    let expires_at = code
        .code_type
        .entitlement_ttl_days()
        .map(|days| now + days * 86_400);

    match queries::redeem_code_atomic(conn, &code.id, user_id, entitlement_type, expires_at)? {
        Some(entitlement) => Ok(Redemption {
            code_type: code.code_type,
            benefits: entitlement_type.benefits(),
            entitlement,
        }),
        // Lost a race between the read and the update; classify from the
        // code's current state.
        None => {
            let current = queries::get_code_by_id(conn, &code.id)?;
            Err(match current {
                Some(c) if c.status == CodeStatus::Redeemed => RedeemError::CodeAlreadyRedeemed,
                Some(c) if c.status == CodeStatus::Expired || c.is_past_valid_until(now) => {
                    RedeemError::CodeExpired
                }
                _ => RedeemError::CodeInvalid,
            })
        }
    }
}
