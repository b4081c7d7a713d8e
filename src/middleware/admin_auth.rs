//! Admin console authentication: bearer API keys, hashed at rest.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::db::{queries, AppState};
use crate::models::{Admin, AdminRole};
use crate::util::extract_bearer_token;

/// The authenticated admin, attached as a request extension by the auth
/// middleware.
#[derive(Clone)]
pub struct AdminContext {
    pub admin: Admin,
}

impl AdminContext {
    pub fn role(&self) -> AdminRole {
        self.admin.role
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Admin, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    queries::get_admin_by_key(&conn, token)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// Require a valid admin key. Any role may read.
pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let admin = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(AdminContext { admin });
    Ok(next.run(request).await)
}

/// Require a role that may mutate (owner or admin; view is read-only).
pub async fn require_write_role(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let admin = authenticate(&state, request.headers())?;
    if !admin.role.can_write() {
        return Err(StatusCode::FORBIDDEN);
    }
    request.extensions_mut().insert(AdminContext { admin });
    Ok(next.run(request).await)
}
