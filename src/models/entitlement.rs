use serde::{Deserialize, Serialize};

/// A concrete benefit the site can gate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benefit {
    /// Early access to the sample chapter.
    Excerpt,
    /// The downloadable agent charter pack bundle.
    AgentCharterPack,
}

/// Category of an entitlement. Related to but independent from CodeType:
/// code redemption produces the matching variant, claim approval produces
/// PreorderBonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementType {
    Preview,
    Bonus,
    Launch,
    Partner,
    Media,
    Influencer,
    /// Granted when a pre-order bonus claim is approved.
    PreorderBonus,
}

impl EntitlementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Bonus => "bonus",
            Self::Launch => "launch",
            Self::Partner => "partner",
            Self::Media => "media",
            Self::Influencer => "influencer",
            Self::PreorderBonus => "preorder_bonus",
        }
    }

    /// Benefits conferred while an entitlement of this type is active.
    pub fn benefits(&self) -> &'static [Benefit] {
        match self {
            Self::Preview | Self::Partner | Self::Media => &[Benefit::Excerpt],
            Self::Bonus | Self::Launch | Self::Influencer => {
                &[Benefit::Excerpt, Benefit::AgentCharterPack]
            }
            Self::PreorderBonus => &[Benefit::AgentCharterPack],
        }
    }
}

impl AsRef<str> for EntitlementType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for EntitlementType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preview" => Ok(Self::Preview),
            "bonus" => Ok(Self::Bonus),
            "launch" => Ok(Self::Launch),
            "partner" => Ok(Self::Partner),
            "media" => Ok(Self::Media),
            "influencer" => Ok(Self::Influencer),
            "preorder_bonus" => Ok(Self::PreorderBonus),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    Expired,
    Revoked,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl AsRef<str> for EntitlementStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for EntitlementStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: String,
    pub user_id: String,
    pub entitlement_type: EntitlementType,
    pub status: EntitlementStatus,
    /// Backlink to the originating code, when the entitlement came from one.
    pub code_id: Option<String>,
    /// None = open-ended.
    pub expires_at: Option<i64>,
    pub fulfilled_at: i64,
    pub created_at: i64,
}

impl Entitlement {
    /// Whether this entitlement contributes benefits at `now`.
    pub fn is_live(&self, now: i64) -> bool {
        self.status == EntitlementStatus::Active
            && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// The resolver's output: every field always populated, never partial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntitlementFlags {
    pub has_excerpt: bool,
    pub has_agent_charter_pack: bool,
    pub has_preordered: bool,
}
