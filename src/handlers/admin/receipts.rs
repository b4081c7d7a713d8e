use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Extension;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::handlers::audit;
use crate::middleware::AdminContext;
use crate::models::{ActorType, Receipt, ReceiptStatus};

fn review(
    state: &AppState,
    ctx: &AdminContext,
    headers: &HeaderMap,
    receipt_id: &str,
    outcome: ReceiptStatus,
) -> Result<Receipt> {
    let conn = state.db.get()?;

    if !queries::review_receipt(&conn, receipt_id, outcome)? {
        return match queries::get_receipt_by_id(&conn, receipt_id)? {
            Some(r) => Err(AppError::Conflict(format!(
                "Receipt is already {}",
                r.status.as_str()
            ))),
            None => Err(AppError::NotFound("Receipt not found".into())),
        };
    }

    audit(
        state,
        headers,
        ActorType::Admin,
        Some(&ctx.admin.id),
        match outcome {
            ReceiptStatus::Verified => "receipt.verify",
            _ => "receipt.reject",
        },
        "receipt",
        receipt_id,
        None,
    );

    queries::get_receipt_by_id(&conn, receipt_id)?
        .ok_or_else(|| AppError::NotFound("Receipt not found".into()))
}

/// POST /admin/receipts/{receipt_id}/verify
pub async fn verify_receipt(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Path(receipt_id): Path<String>,
) -> Result<axum::Json<Receipt>> {
    let receipt = review(&state, &ctx, &headers, &receipt_id, ReceiptStatus::Verified)?;
    Ok(axum::Json(receipt))
}

/// POST /admin/receipts/{receipt_id}/reject
pub async fn reject_receipt(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Path(receipt_id): Path<String>,
) -> Result<axum::Json<Receipt>> {
    let receipt = review(&state, &ctx, &headers, &receipt_id, ReceiptStatus::Rejected)?;
    Ok(axum::Json(receipt))
}
