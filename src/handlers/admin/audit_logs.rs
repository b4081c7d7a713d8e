use axum::extract::State;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Query;
use crate::models::AuditLog;
use crate::pagination::{Paged, PaginationParams};

/// GET /admin/audit-logs - newest first.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<axum::Json<Paged<AuditLog>>> {
    let (limit, offset) = params.clamp();
    let conn = state.audit.get()?;
    let (logs, total) = queries::list_audit_logs_paginated(&conn, limit, offset)?;
    Ok(axum::Json(Paged::new(logs, total, limit, offset)))
}
