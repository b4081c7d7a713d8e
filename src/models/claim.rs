use serde::{Deserialize, Serialize};

/// State of a pre-order bonus claim.
///
/// Forward-only: pending -> approved -> delivered, or pending -> rejected.
/// rejected and delivered are terminal; a rejected claim is never
/// resurrected, the user submits a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
    Delivered,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Delivered => "delivered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Delivered)
    }

    /// Whether a claim in this state authorizes an asset download.
    pub fn allows_download(&self) -> bool {
        matches!(self, Self::Approved | Self::Delivered)
    }
}

impl AsRef<str> for ClaimStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "delivered" => Ok(Self::Delivered),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusClaim {
    pub id: String,
    pub user_id: String,
    /// Where the download link is sent; may differ from the account email.
    pub delivery_email: String,
    pub receipt_id: String,
    pub status: ClaimStatus,
    pub submitted_at: i64,
    pub reviewed_at: Option<i64>,
    pub delivered_at: Option<i64>,
}

/// Input for a user-submitted bonus claim.
#[derive(Debug, Deserialize)]
pub struct CreateBonusClaim {
    pub delivery_email: String,
    /// Opaque reference to the uploaded receipt in external storage.
    pub receipt_ref: String,
}
