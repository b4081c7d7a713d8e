use serde::{Deserialize, Serialize};

/// Review state of an uploaded proof-of-purchase receipt.
///
/// Verification is human-gated: an admin inspects the upload and marks it
/// verified or rejected. A verified receipt drives the has_preordered flag
/// independently of any entitlement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Verified,
    Rejected,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl AsRef<str> for ReceiptStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub user_id: String,
    /// Opaque pointer into the external upload store. Content validation
    /// (type, size, malware) happens there, not here.
    pub storage_ref: String,
    pub status: ReceiptStatus,
    pub uploaded_at: i64,
    pub reviewed_at: Option<i64>,
}
