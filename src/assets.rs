//! Static registry of downloadable assets.
//!
//! Assets are release artifacts, not user data: the set is fixed at compile
//! time and the bytes live in external storage behind `storage_ref`. Tokens
//! are scoped to an asset id, so the registry is also the allowlist.

use serde::Serialize;

/// A downloadable artifact delivered through signed links.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Asset {
    pub id: &'static str,
    pub filename: &'static str,
    pub content_type: &'static str,
    /// Opaque reference into the object store holding the bytes.
    #[serde(skip_serializing)]
    pub storage_ref: &'static str,
}

pub const ASSET_AGENT_CHARTER_PACK: &str = "agent-charter-pack";
pub const ASSET_SAMPLE_CHAPTER: &str = "sample-chapter";

const ASSETS: &[Asset] = &[
    Asset {
        id: ASSET_AGENT_CHARTER_PACK,
        filename: "agent-charter-pack.zip",
        content_type: "application/zip",
        storage_ref: "assets/agent-charter-pack-v1.zip",
    },
    Asset {
        id: ASSET_SAMPLE_CHAPTER,
        filename: "sample-chapter.pdf",
        content_type: "application/pdf",
        storage_ref: "assets/sample-chapter-v1.pdf",
    },
];

/// Look up an asset by its public id. Unknown ids simply don't exist;
/// no token can be minted or verified for them.
pub fn get_asset(id: &str) -> Option<&'static Asset> {
    ASSETS.iter().find(|a| a.id == id)
}
