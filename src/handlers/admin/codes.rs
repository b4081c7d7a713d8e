use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::handlers::audit;
use crate::middleware::AdminContext;
use crate::models::{ActorType, CodeStatus, CreateCodeBatch, VipCode};
use crate::pagination::{Paged, PaginationParams};

#[derive(Serialize)]
pub struct GenerateCodesResponse {
    pub batch_id: String,
    pub count: usize,
    pub codes: Vec<VipCode>,
}

/// POST /admin/codes - generate a batch of codes.
pub async fn generate_codes(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Json(req): Json<CreateCodeBatch>,
) -> Result<(StatusCode, axum::Json<GenerateCodesResponse>)> {
    let mut conn = state.db.get()?;
    let codes = queries::generate_codes(&mut conn, &req)?;
    // generate_codes rejects count < 1, so the batch is never empty
    let batch_id = codes[0].batch_id.clone();

    tracing::info!(
        admin_id = %ctx.admin.id,
        batch_id = %batch_id,
        count = codes.len(),
        code_type = %req.code_type.as_str(),
        "Generated code batch"
    );
    audit(
        &state,
        &headers,
        ActorType::Admin,
        Some(&ctx.admin.id),
        "code.generate",
        "code_batch",
        &batch_id,
        Some(serde_json::json!({
            "count": codes.len(),
            "code_type": req.code_type.as_str(),
            "max_redemptions": req.max_redemptions,
        })),
    );

    Ok((
        StatusCode::CREATED,
        axum::Json(GenerateCodesResponse {
            batch_id,
            count: codes.len(),
            codes,
        }),
    ))
}

#[derive(Deserialize, Default)]
pub struct ListCodesParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub batch_id: Option<String>,
    pub status: Option<String>,
}

/// GET /admin/codes - list codes, filterable by batch and status.
pub async fn list_codes(
    State(state): State<AppState>,
    Query(params): Query<ListCodesParams>,
) -> Result<axum::Json<Paged<VipCode>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            s.parse::<CodeStatus>()
                .map_err(|_| AppError::BadRequest(format!("Unknown code status: {}", s)))
        })
        .transpose()?;

    let (limit, offset) = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    }
    .clamp();
    let conn = state.db.get()?;
    let (codes, total) =
        queries::list_codes_paginated(&conn, params.batch_id.as_deref(), status, limit, offset)?;

    Ok(axum::Json(Paged::new(codes, total, limit, offset)))
}

/// GET /admin/codes/{code_id}
pub async fn get_code(
    State(state): State<AppState>,
    Path(code_id): Path<String>,
) -> Result<axum::Json<VipCode>> {
    let conn = state.db.get()?;
    let code = queries::get_code_by_id(&conn, &code_id)?
        .ok_or_else(|| AppError::NotFound("Code not found".into()))?;
    Ok(axum::Json(code))
}

#[derive(Deserialize)]
pub struct ExportCodesParams {
    pub batch_id: String,
}

/// GET /admin/codes/export?batch_id=... - plain-text export, one code per
/// line, for handing to a mailing tool or printer.
pub async fn export_codes(
    State(state): State<AppState>,
    Query(params): Query<ExportCodesParams>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let codes = queries::list_codes_for_batch(&conn, &params.batch_id)?;
    if codes.is_empty() {
        return Err(AppError::NotFound("Batch not found".into()));
    }

    let body = codes
        .iter()
        .map(|c| c.code.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body + "\n",
    ))
}

/// POST /admin/codes/{code_id}/revoke - pull a code out of circulation.
pub async fn revoke_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    headers: HeaderMap,
    Path(code_id): Path<String>,
) -> Result<axum::Json<VipCode>> {
    let conn = state.db.get()?;

    if !queries::revoke_code(&conn, &code_id)? {
        return match queries::get_code_by_id(&conn, &code_id)? {
            Some(code) => Err(AppError::Conflict(format!(
                "Code is {} and cannot be revoked",
                code.status.as_str()
            ))),
            None => Err(AppError::NotFound("Code not found".into())),
        };
    }

    audit(
        &state,
        &headers,
        ActorType::Admin,
        Some(&ctx.admin.id),
        "code.revoke",
        "vip_code",
        &code_id,
        None,
    );

    let code = queries::get_code_by_id(&conn, &code_id)?
        .ok_or_else(|| AppError::NotFound("Code not found".into()))?;
    Ok(axum::Json(code))
}
