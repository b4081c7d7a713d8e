pub mod admin;
pub mod public;

use axum::http::HeaderMap;

use crate::db::{queries, AppState};
use crate::models::ActorType;
use crate::util::extract_request_info;

/// Write an audit entry, never failing the request it describes.
/// Audit writes go to the separate audit pool; a full disk there should
/// not take redemptions down with it.
pub(crate) fn audit(
    state: &AppState,
    headers: &HeaderMap,
    actor_type: ActorType,
    actor_id: Option<&str>,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    details: Option<serde_json::Value>,
) {
    let (ip, user_agent) = extract_request_info(headers);
    let result = state.audit.get().map_err(crate::error::AppError::from).and_then(|conn| {
        queries::create_audit_log(
            &conn,
            state.audit_log_enabled,
            actor_type,
            actor_id,
            action,
            resource_type,
            resource_id,
            details.as_ref(),
            ip.as_deref(),
            user_agent.as_deref(),
        )
    });
    if let Err(e) = result {
        tracing::warn!(action, "Failed to write audit log: {}", e);
    }
}
