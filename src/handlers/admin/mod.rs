mod audit_logs;
mod claims;
mod codes;
mod receipts;

pub use audit_logs::*;
pub use claims::*;
pub use codes::*;
pub use receipts::*;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::db::AppState;
use crate::middleware::{admin_auth, require_write_role};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Mutations (owner/admin roles)
        .route("/admin/codes", post(generate_codes))
        .route("/admin/codes/{code_id}/revoke", post(revoke_code))
        .route("/admin/claims/{claim_id}/approve", post(approve_claim))
        .route("/admin/claims/{claim_id}/reject", post(reject_claim))
        .route("/admin/claims/{claim_id}/link", post(link_claim_download))
        .route("/admin/receipts/{receipt_id}/verify", post(verify_receipt))
        .route("/admin/receipts/{receipt_id}/reject", post(reject_receipt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_write_role,
        ))
        .merge(
            // Reads (any role, including view)
            Router::new()
                .route("/admin/codes", get(list_codes))
                .route("/admin/codes/{code_id}", get(get_code))
                .route("/admin/codes/export", get(export_codes))
                .route("/admin/claims", get(list_claims))
                .route("/admin/claims/{claim_id}", get(get_claim_detail))
                .route("/admin/audit-logs", get(list_audit_logs))
                .layer(middleware::from_fn_with_state(state.clone(), admin_auth)),
        )
}
