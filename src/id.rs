//! Prefixed ID generation for Bookperks entities.
//!
//! All IDs use a `bp_` brand prefix so identifiers are self-describing in
//! logs, audit entries and support tickets.
//!
//! Format: `bp_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "bp_usr_",
    "bp_code_",
    "bp_ent_",
    "bp_clm_",
    "bp_rcpt_",
    "bp_adm_",
    "bp_aud_",
    "bp_batch_",
];

/// Validate that a string is a valid Bookperks prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `bp_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    // Must start with a known prefix
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    // Get the hex part after the prefix
    let hex_part = &s[prefix.len()..];

    // Must be exactly 32 hex characters
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Bookperks.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    VipCode,
    Entitlement,
    BonusClaim,
    Receipt,
    Admin,
    AuditLog,
    CodeBatch,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "bp_usr",
            Self::VipCode => "bp_code",
            Self::Entitlement => "bp_ent",
            Self::BonusClaim => "bp_clm",
            Self::Receipt => "bp_rcpt",
            Self::Admin => "bp_adm",
            Self::AuditLog => "bp_aud",
            Self::CodeBatch => "bp_batch",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
