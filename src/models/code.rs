use serde::{Deserialize, Serialize};

use super::EntitlementType;

/// Length of a VIP code after normalization (no separators).
pub const CODE_LENGTH: usize = 12;

/// Alphabet used when generating codes. Uppercase alphanumeric with the
/// ambiguous characters (0/O, 1/I/L) removed so codes survive being read
/// aloud or retyped from print.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Category of a VIP code. Each type maps to a fixed entitlement type
/// (and through it, a benefit set) on redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    /// Early-excerpt access for the pre-launch mailing list.
    Preview,
    /// Full bonus bundle: excerpt plus the agent charter pack.
    Bonus,
    /// Launch-week ambassador codes.
    Launch,
    /// Retail/newsletter partner codes.
    Partner,
    /// Press review codes.
    Media,
    /// Influencer campaign codes.
    Influencer,
}

impl CodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Bonus => "bonus",
            Self::Launch => "launch",
            Self::Partner => "partner",
            Self::Media => "media",
            Self::Influencer => "influencer",
        }
    }

    /// The entitlement type granted when a code of this type is redeemed.
    pub fn entitlement_type(&self) -> EntitlementType {
        match self {
            Self::Preview => EntitlementType::Preview,
            Self::Bonus => EntitlementType::Bonus,
            Self::Launch => EntitlementType::Launch,
            Self::Partner => EntitlementType::Partner,
            Self::Media => EntitlementType::Media,
            Self::Influencer => EntitlementType::Influencer,
        }
    }

    /// How long the granted entitlement lives, in days. None = open-ended.
    ///
    /// Preview and press access are time-boxed; everything else is tied to
    /// the book itself and never expires.
    pub fn entitlement_ttl_days(&self) -> Option<i64> {
        match self {
            Self::Preview | Self::Media => Some(90),
            _ => None,
        }
    }
}

impl AsRef<str> for CodeType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for CodeType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preview" => Ok(Self::Preview),
            "bonus" => Ok(Self::Bonus),
            "launch" => Ok(Self::Launch),
            "partner" => Ok(Self::Partner),
            "media" => Ok(Self::Media),
            "influencer" => Ok(Self::Influencer),
            _ => Err(()),
        }
    }
}

/// Lifecycle state of a VIP code.
///
/// Transitions: active -> redeemed (count hits ceiling, inside the atomic
/// redemption update), active -> expired (valid_until passed), and
/// active|redeemed -> revoked (admin). expired and revoked are terminal
/// for redemption regardless of remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    Active,
    Redeemed,
    Expired,
    Revoked,
}

impl CodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl AsRef<str> for CodeStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for CodeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "redeemed" => Ok(Self::Redeemed),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipCode {
    pub id: String,
    /// The human-enterable code itself (12 chars, uppercase alphanumeric).
    pub code: String,
    pub code_type: CodeType,
    pub status: CodeStatus,
    /// Redemption ceiling (None = unlimited).
    pub max_redemptions: Option<i64>,
    /// Monotonic; never exceeds max_redemptions when set.
    pub redemption_count: i64,
    pub valid_from: i64,
    /// None = no expiry.
    pub valid_until: Option<i64>,
    pub description: Option<String>,
    /// Groups codes generated in the same admin batch, for export.
    pub batch_id: String,
    pub created_at: i64,
}

impl VipCode {
    /// Whether the validity window has closed at `now`, independent of the
    /// persisted status (the status flip may lag the wall clock). Inclusive
    /// at the boundary, matching the `valid_until > now` guard in the
    /// atomic redemption update: at `now == valid_until` the code is gone.
    pub fn is_past_valid_until(&self, now: i64) -> bool {
        self.valid_until.is_some_and(|until| now >= until)
    }

    /// Remaining capacity, if a ceiling is set.
    pub fn remaining(&self) -> Option<i64> {
        self.max_redemptions
            .map(|max| (max - self.redemption_count).max(0))
    }
}

/// Input for administrative batch code generation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCodeBatch {
    pub count: i64,
    pub code_type: CodeType,
    /// >= 1, or None for unlimited.
    #[serde(default)]
    pub max_redemptions: Option<i64>,
    /// Unix timestamp; None = no expiry.
    #[serde(default)]
    pub valid_until: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}
