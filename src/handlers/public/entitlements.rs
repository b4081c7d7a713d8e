use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::db::AppState;
use crate::entitlements;
use crate::error::Result;
use crate::middleware::Identity;
use crate::models::EntitlementFlags;

/// GET /entitlements - the authenticated user's benefit flags.
///
/// Always the full flag struct; a user with nothing gets all-false.
pub async fn get_entitlements(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<EntitlementFlags>> {
    let conn = state.db.get()?;
    let flags = entitlements::resolve(&conn, &identity.user.id, Utc::now().timestamp())?;
    Ok(Json(flags))
}
