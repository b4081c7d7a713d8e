//! End-user identity for the public API.
//!
//! Authentication itself lives in the identity provider in front of this
//! service; by the time a request reaches us, the proxy has validated the
//! session and stamped `x-auth-subject` (stable IdP subject) and
//! `x-auth-email` onto the request. We mirror the subject into a local
//! user row so entitlements and claims have something to hang off.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::db::{queries, AppState};
use crate::error::AppError;
use crate::models::User;

const SUBJECT_HEADER: &str = "x-auth-subject";
const EMAIL_HEADER: &str = "x-auth-email";

/// The authenticated end user, upserted into the local mirror.
///
/// Extraction fails with 401 when the identity headers are absent, so
/// handlers taking `Identity` never see anonymous traffic.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let subject =
            header_value(parts, SUBJECT_HEADER).ok_or(AppError::AuthenticationRequired)?;
        let email = header_value(parts, EMAIL_HEADER).ok_or(AppError::AuthenticationRequired)?;

        let conn = state.db.get()?;
        let user = queries::upsert_user(&conn, &subject, &email)?;
        Ok(Identity { user })
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
