use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Owner,
    Admin,
    /// Read-only access to the console.
    View,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::View => "view",
        }
    }

    /// Whether this role may mutate state (generate/revoke codes, review
    /// claims). View-only admins can list and export.
    pub fn can_write(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl AsRef<str> for AdminRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for AdminRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "view" => Ok(Self::View),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    /// SHA-256 hash of the admin API key; the raw key is shown once.
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub created_at: i64,
    pub revoked_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdmin {
    pub email: String,
    pub name: String,
    pub role: AdminRole,
}
