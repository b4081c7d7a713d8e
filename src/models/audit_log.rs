use serde::{Deserialize, Serialize};

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// An authenticated admin-console principal.
    Admin,
    /// An end user on the public API.
    Public,
    /// Background tasks, bootstrap, CLI.
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Public => "public",
            Self::System => "system",
        }
    }
}

impl AsRef<str> for ActorType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for ActorType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "public" => Ok(Self::Public),
            "system" => Ok(Self::System),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub timestamp: i64,
    pub actor_type: ActorType,
    /// Admin id or user id; None for system actions.
    pub actor_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
