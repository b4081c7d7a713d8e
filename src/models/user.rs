use serde::{Deserialize, Serialize};

/// Local mirror of an identity-provider subject.
///
/// The identity provider is the source of truth; a row is upserted here on
/// first authenticated request so entitlements and claims have a stable
/// foreign key to hang off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Opaque subject identifier from the identity provider.
    pub subject: String,
    pub email: String,
    pub created_at: i64,
    pub updated_at: i64,
}
