//! Signed asset download tokens.
//!
//! A token is `base64url(payload_json) + "." + base64url(hmac_sha256)`,
//! signed with a server-held secret. The same process mints and verifies,
//! so a keyed MAC is sufficient; there is no third-party verifier to hand
//! a public key to. A token binds one claim and one asset together with a
//! short expiry, and is URL-safe so it works both as a query parameter and
//! a bearer header value.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How long a minted token stays valid.
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// No signing secret configured. Minting and verification both fail
    /// closed rather than falling back to unsigned links.
    #[error("Download token secret is not configured")]
    MissingSecret,
    /// Not two dot-separated base64url parts, or the payload is not the
    /// expected JSON shape.
    #[error("Malformed token")]
    Malformed,
    #[error("Token signature is invalid")]
    SignatureInvalid,
    #[error("Token has expired")]
    Expired,
    /// Structurally valid and signed, but minted for a different asset.
    #[error("Token was issued for a different asset")]
    AssetMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    claim_id: String,
    email: String,
    asset_id: String,
    issued_at: i64,
    expires_at: i64,
}

/// The claims recovered from a successfully verified token.
///
/// Holding one is not authorization by itself: the download path re-checks
/// the live bonus-claim status, since a claim can be rejected after the
/// token was minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub claim_id: String,
    pub email: String,
    pub expires_at: i64,
}

fn mac(secret: &str, payload_b64: &str) -> HmacSha256 {
    // HMAC accepts keys of any length; this cannot fail for Hmac<Sha256>
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload_b64.as_bytes());
    mac
}

/// Mint a token tying a claim to an asset, valid for [`TOKEN_TTL_SECS`].
pub fn issue_token(
    secret: Option<&str>,
    claim_id: &str,
    email: &str,
    asset_id: &str,
) -> Result<String, TokenError> {
    let secret = secret.ok_or(TokenError::MissingSecret)?;
    let now = Utc::now().timestamp();
    let payload = TokenPayload {
        claim_id: claim_id.to_string(),
        email: email.to_string(),
        asset_id: asset_id.to_string(),
        issued_at: now,
        expires_at: now + TOKEN_TTL_SECS,
    };
    let payload_json = serde_json::to_vec(&payload).map_err(|_| TokenError::Malformed)?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
    let sig = mac(secret, &payload_b64).finalize().into_bytes();
    Ok(format!("{}.{}", payload_b64, URL_SAFE_NO_PAD.encode(sig)))
}

/// Verify a token against the expected asset.
///
/// Check order matters: structure, then signature, then expiry, then asset
/// scope. Expiry and scope are only trusted after the signature proves the
/// payload is ours, and signature comparison is constant-time.
pub fn verify_token(
    secret: Option<&str>,
    token: &str,
    expected_asset_id: &str,
    now: i64,
) -> Result<VerifiedToken, TokenError> {
    let secret = secret.ok_or(TokenError::MissingSecret)?;

    let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    if payload_b64.is_empty() || sig_b64.is_empty() || sig_b64.contains('.') {
        return Err(TokenError::Malformed);
    }
    let sig = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Malformed)?;

    mac(secret, payload_b64)
        .verify_slice(&sig)
        .map_err(|_| TokenError::SignatureInvalid)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::Malformed)?;
    let payload: TokenPayload =
        serde_json::from_slice(&payload_json).map_err(|_| TokenError::Malformed)?;

    if payload.expires_at <= now {
        return Err(TokenError::Expired);
    }
    if payload.asset_id != expected_asset_id {
        return Err(TokenError::AssetMismatch);
    }

    Ok(VerifiedToken {
        claim_id: payload.claim_id,
        email: payload.email,
        expires_at: payload.expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";
    const CLAIM: &str = "bp_clm_00000000000000000000000000000001";

    #[test]
    fn round_trip() {
        let token = issue_token(Some(SECRET), CLAIM, "reader@example.com", "sample-chapter")
            .unwrap();
        let verified =
            verify_token(Some(SECRET), &token, "sample-chapter", Utc::now().timestamp()).unwrap();
        assert_eq!(verified.claim_id, CLAIM);
        assert_eq!(verified.email, "reader@example.com");
    }

    #[test]
    fn missing_secret_fails_closed_both_ways() {
        assert_eq!(
            issue_token(None, CLAIM, "e@x.com", "sample-chapter"),
            Err(TokenError::MissingSecret)
        );
        let token = issue_token(Some(SECRET), CLAIM, "e@x.com", "sample-chapter").unwrap();
        assert_eq!(
            verify_token(None, &token, "sample-chapter", 0),
            Err(TokenError::MissingSecret)
        );
    }

    #[test]
    fn malformed_tokens_rejected() {
        let now = Utc::now().timestamp();
        for bad in ["", "nodot", "a.b.c", ".", "only.", ".only", "!!!.###"] {
            let err = verify_token(Some(SECRET), bad, "sample-chapter", now).unwrap_err();
            assert!(
                matches!(err, TokenError::Malformed | TokenError::SignatureInvalid),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn tampered_payload_rejected() {
        let token = issue_token(Some(SECRET), CLAIM, "e@x.com", "sample-chapter").unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"claim_id":"{}","email":"e@x.com","asset_id":"agent-charter-pack","issued_at":0,"expires_at":9999999999}}"#,
            CLAIM
        ));
        let forged = format!("{forged_payload}.{sig}");
        assert_eq!(
            verify_token(Some(SECRET), &forged, "agent-charter-pack", 0),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_token(Some(SECRET), CLAIM, "e@x.com", "sample-chapter").unwrap();
        assert_eq!(
            verify_token(Some("other-secret"), &token, "sample-chapter", 0),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn expiry_boundary_respected() {
        let issued = Utc::now().timestamp();
        let token = issue_token(Some(SECRET), CLAIM, "e@x.com", "sample-chapter").unwrap();

        // Still good just inside the TTL
        let just_inside = issued + TOKEN_TTL_SECS - 60;
        assert!(verify_token(Some(SECRET), &token, "sample-chapter", just_inside).is_ok());

        // Dead just past it
        let just_past = issued + TOKEN_TTL_SECS + 60;
        assert_eq!(
            verify_token(Some(SECRET), &token, "sample-chapter", just_past),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn asset_scope_enforced() {
        let token = issue_token(Some(SECRET), CLAIM, "e@x.com", "sample-chapter").unwrap();
        assert_eq!(
            verify_token(
                Some(SECRET),
                &token,
                "agent-charter-pack",
                Utc::now().timestamp()
            ),
            Err(TokenError::AssetMismatch)
        );
    }
}
