use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::claims::{self, DownloadError};
use crate::db::AppState;
use crate::error::AppError;
use crate::handlers::audit;
use crate::models::ActorType;

#[derive(Deserialize)]
pub struct DownloadParams {
    pub token: String,
}

#[derive(Serialize)]
pub struct AssetDescriptor {
    pub asset_id: &'static str,
    pub filename: &'static str,
    pub content_type: &'static str,
    /// Where the bytes actually live; the CDN in front resolves this.
    pub url: String,
}

/// GET /assets/{asset_id}?token=... - authorize a download.
///
/// Token-authenticated, no session required: links are emailed and get
/// pasted into other browsers and download managers. The token alone is
/// not enough; the claim it names is re-checked at download time, and the
/// first download flips an approved claim to delivered.
pub async fn download_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    crate::extractors::Query(params): crate::extractors::Query<DownloadParams>,
    headers: HeaderMap,
) -> std::result::Result<Json<AssetDescriptor>, DownloadError> {
    let conn = state.db.get().map_err(AppError::from)?;
    let asset = claims::authorize_download(
        &conn,
        state.download_token_secret.as_deref(),
        &params.token,
        &asset_id,
    )?;

    audit(
        &state,
        &headers,
        ActorType::Public,
        None,
        "asset.download",
        "asset",
        asset.id,
        None,
    );

    Ok(Json(AssetDescriptor {
        asset_id: asset.id,
        filename: asset.filename,
        content_type: asset.content_type,
        url: format!("{}/{}", state.base_url, asset.storage_ref),
    }))
}
