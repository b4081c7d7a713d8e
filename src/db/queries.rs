use chrono::Utc;
use rusqlite::{params, Connection};

use crate::crypto::hash_secret;
use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, FromRow, ADMIN_COLS, AUDIT_LOG_COLS, BONUS_CLAIM_COLS, ENTITLEMENT_COLS,
    RECEIPT_COLS, USER_COLS, VIP_CODE_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Maximum codes per generation batch.
pub const MAX_BATCH_SIZE: i64 = 10_000;

/// How many times a single code slot is regenerated on a UNIQUE collision
/// before the batch fails. With a 31-char alphabet and 12 positions a single
/// collision is already vanishingly unlikely; five in a row means something
/// is broken.
const MAX_CODE_RETRIES: u32 = 5;

// ============ Users ============

/// Upsert the local mirror row for an identity-provider subject.
///
/// The IdP owns identity; we refresh the email on every hit so the mirror
/// follows address changes.
pub fn upsert_user(conn: &Connection, subject: &str, email: &str) -> Result<User> {
    let ts = now();
    let id = EntityType::User.gen_id();
    let user = conn.query_row(
        &format!(
            "INSERT INTO users (id, subject, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(subject) DO UPDATE SET email = excluded.email, updated_at = excluded.updated_at
             RETURNING {}",
            USER_COLS
        ),
        params![&id, subject, email, ts],
        User::from_row,
    )?;
    Ok(user)
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_subject(conn: &Connection, subject: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE subject = ?1", USER_COLS),
        &[&subject],
    )
}

// ============ Admins ============

pub fn create_admin(conn: &Connection, input: &CreateAdmin, raw_key: &str) -> Result<Admin> {
    let id = EntityType::Admin.gen_id();
    let ts = now();
    let key_hash = hash_secret(raw_key);

    conn.execute(
        "INSERT INTO admins (id, email, name, role, key_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &input.email, &input.name, input.role.as_ref(), &key_hash, ts],
    )?;

    Ok(Admin {
        id,
        email: input.email.clone(),
        name: input.name.clone(),
        role: input.role,
        key_hash,
        created_at: ts,
        revoked_at: None,
    })
}

/// Look up an admin by raw API key. Returns None for unknown or revoked keys.
pub fn get_admin_by_key(conn: &Connection, raw_key: &str) -> Result<Option<Admin>> {
    let hash = hash_secret(raw_key);
    query_one(
        conn,
        &format!(
            "SELECT {} FROM admins WHERE key_hash = ?1 AND revoked_at IS NULL",
            ADMIN_COLS
        ),
        &[&hash],
    )
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
        .map_err(Into::into)
}

// ============ VIP Codes ============

fn random_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Generate a batch of codes in a single transaction.
///
/// Each code identity is drawn fresh and re-drawn on a UNIQUE collision
/// (bounded retries per slot) so one collision never fails the batch.
pub fn generate_codes(conn: &mut Connection, input: &CreateCodeBatch) -> Result<Vec<VipCode>> {
    if input.count < 1 || input.count > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_BATCH_SIZE
        )));
    }
    if input.max_redemptions.is_some_and(|m| m < 1) {
        return Err(AppError::BadRequest(
            "max_redemptions must be at least 1".into(),
        ));
    }
    let ts = now();
    if input.valid_until.is_some_and(|until| until <= ts) {
        return Err(AppError::BadRequest(
            "valid_until must be in the future".into(),
        ));
    }

    let batch_id = EntityType::CodeBatch.gen_id();
    let tx = conn.transaction()?;
    let mut codes = Vec::with_capacity(input.count as usize);

    for _ in 0..input.count {
        let id = EntityType::VipCode.gen_id();
        let mut attempts = 0;
        let code = loop {
            let candidate = random_code();
            let inserted = tx.execute(
                "INSERT INTO vip_codes (id, code, code_type, status, max_redemptions, redemption_count, valid_from, valid_until, description, batch_id, created_at)
                 VALUES (?1, ?2, ?3, 'active', ?4, 0, ?5, ?6, ?7, ?8, ?5)",
                params![
                    &id,
                    &candidate,
                    input.code_type.as_ref(),
                    input.max_redemptions,
                    ts,
                    input.valid_until,
                    &input.description,
                    &batch_id,
                ],
            );
            match inserted {
                Ok(_) => break candidate,
                Err(e) if is_unique_violation(&e) => {
                    attempts += 1;
                    if attempts >= MAX_CODE_RETRIES {
                        return Err(AppError::Internal(
                            "Exhausted retries generating a unique code".into(),
                        ));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        codes.push(VipCode {
            id,
            code,
            code_type: input.code_type,
            status: CodeStatus::Active,
            max_redemptions: input.max_redemptions,
            redemption_count: 0,
            valid_from: ts,
            valid_until: input.valid_until,
            description: input.description.clone(),
            batch_id: batch_id.clone(),
            created_at: ts,
        });
    }

    tx.commit()?;
    Ok(codes)
}

pub fn get_code_by_code(conn: &Connection, code: &str) -> Result<Option<VipCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM vip_codes WHERE code = ?1", VIP_CODE_COLS),
        &[&code],
    )
}

pub fn get_code_by_id(conn: &Connection, id: &str) -> Result<Option<VipCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM vip_codes WHERE id = ?1", VIP_CODE_COLS),
        &[&id],
    )
}

pub fn list_codes_paginated(
    conn: &Connection,
    batch_id: Option<&str>,
    status: Option<CodeStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<VipCode>, i64)> {
    let status_str = status.map(|s| s.as_str().to_string());
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM vip_codes
         WHERE (?1 IS NULL OR batch_id = ?1) AND (?2 IS NULL OR status = ?2)",
        params![batch_id, status_str],
        |row| row.get(0),
    )?;

    let codes = query_all(
        conn,
        &format!(
            "SELECT {} FROM vip_codes
             WHERE (?1 IS NULL OR batch_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4",
            VIP_CODE_COLS
        ),
        &[&batch_id, &status_str, &limit, &offset],
    )?;

    Ok((codes, total))
}

/// All codes in a generation batch, for delimited-text export.
pub fn list_codes_for_batch(conn: &Connection, batch_id: &str) -> Result<Vec<VipCode>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM vip_codes WHERE batch_id = ?1 ORDER BY created_at, id",
            VIP_CODE_COLS
        ),
        &[&batch_id],
    )
}

/// Atomically consume one redemption of a code and create the entitlement.
///
/// The counter increment, the capacity/expiry/status guards, and the
/// REDEEMED flip all live in one conditional UPDATE, so two concurrent
/// attempts against a code with one remaining use cannot both match: the
/// loser sees zero affected rows and this returns `None` with nothing
/// written. The entitlement insert shares the transaction - no partial
/// writes on either side.
pub fn redeem_code_atomic(
    conn: &mut Connection,
    code_id: &str,
    user_id: &str,
    entitlement_type: EntitlementType,
    entitlement_expires_at: Option<i64>,
) -> Result<Option<Entitlement>> {
    let ts = now();
    // IMMEDIATE acquires the write lock up front, preventing TOCTOU races
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let affected = tx.execute(
        "UPDATE vip_codes
         SET redemption_count = redemption_count + 1,
             status = CASE
                 WHEN max_redemptions IS NOT NULL AND redemption_count + 1 >= max_redemptions
                 THEN 'redeemed'
                 ELSE status
             END
         WHERE id = ?1
           AND status = 'active'
           AND (max_redemptions IS NULL OR redemption_count < max_redemptions)
           AND (valid_until IS NULL OR valid_until > ?2)",
        params![code_id, ts],
    )?;

    if affected == 0 {
        // Lost the race, over capacity, expired, or revoked underneath us
        return Ok(None);
    }

    let ent_id = EntityType::Entitlement.gen_id();
    tx.execute(
        "INSERT INTO entitlements (id, user_id, entitlement_type, status, code_id, expires_at, fulfilled_at, created_at)
         VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?6)",
        params![&ent_id, user_id, entitlement_type.as_ref(), code_id, entitlement_expires_at, ts],
    )?;

    tx.commit()?;

    Ok(Some(Entitlement {
        id: ent_id,
        user_id: user_id.to_string(),
        entitlement_type,
        status: EntitlementStatus::Active,
        code_id: Some(code_id.to_string()),
        expires_at: entitlement_expires_at,
        fulfilled_at: ts,
        created_at: ts,
    }))
}

/// Opportunistically flip a code whose window has closed to `expired`.
/// Best-effort: the redemption guard does not depend on this.
pub fn mark_code_expired(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE vip_codes SET status = 'expired' WHERE id = ?1 AND status = 'active'",
        params![id],
    )?;
    Ok(affected > 0)
}

/// Sweep all active codes whose valid_until has passed. Run periodically.
pub fn expire_due_codes(conn: &Connection) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE vip_codes SET status = 'expired'
         WHERE status = 'active' AND valid_until IS NOT NULL AND valid_until <= ?1",
        params![now()],
    )?;
    Ok(affected)
}

/// Administrative revocation. Terminal; allowed from active or redeemed.
pub fn revoke_code(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE vip_codes SET status = 'revoked'
         WHERE id = ?1 AND status IN ('active', 'redeemed')",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Entitlements ============

/// All entitlements currently conferring benefits for a user: active status
/// and not past expiry. Pure read.
pub fn list_live_entitlements_for_user(
    conn: &Connection,
    user_id: &str,
    now_ts: i64,
) -> Result<Vec<Entitlement>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM entitlements
             WHERE user_id = ?1 AND status = 'active'
               AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY created_at",
            ENTITLEMENT_COLS
        ),
        &[&user_id, &now_ts],
    )
}

pub fn list_entitlements_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Entitlement>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM entitlements WHERE user_id = ?1 ORDER BY created_at",
            ENTITLEMENT_COLS
        ),
        &[&user_id],
    )
}

/// Sweep entitlements whose expiry has passed. The resolver filters on
/// expiry anyway; this keeps the persisted status honest for the console.
pub fn expire_due_entitlements(conn: &Connection) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE entitlements SET status = 'expired'
         WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1",
        params![now()],
    )?;
    Ok(affected)
}

// ============ Receipts ============

pub fn create_receipt(conn: &Connection, user_id: &str, storage_ref: &str) -> Result<Receipt> {
    let id = EntityType::Receipt.gen_id();
    let ts = now();
    conn.execute(
        "INSERT INTO receipts (id, user_id, storage_ref, status, uploaded_at)
         VALUES (?1, ?2, ?3, 'pending', ?4)",
        params![&id, user_id, storage_ref, ts],
    )?;
    Ok(Receipt {
        id,
        user_id: user_id.to_string(),
        storage_ref: storage_ref.to_string(),
        status: ReceiptStatus::Pending,
        uploaded_at: ts,
        reviewed_at: None,
    })
}

pub fn get_receipt_by_id(conn: &Connection, id: &str) -> Result<Option<Receipt>> {
    query_one(
        conn,
        &format!("SELECT {} FROM receipts WHERE id = ?1", RECEIPT_COLS),
        &[&id],
    )
}

/// Record the human review outcome. Conditional on pending so two admins
/// reviewing the same receipt cannot both win.
pub fn review_receipt(conn: &Connection, id: &str, status: ReceiptStatus) -> Result<bool> {
    if status == ReceiptStatus::Pending {
        return Err(AppError::BadRequest(
            "Review outcome must be verified or rejected".into(),
        ));
    }
    let affected = conn.execute(
        "UPDATE receipts SET status = ?2, reviewed_at = ?3 WHERE id = ?1 AND status = 'pending'",
        params![id, status.as_ref(), now()],
    )?;
    Ok(affected > 0)
}

/// Whether the user has any verified proof-of-purchase receipt.
pub fn has_verified_receipt(conn: &Connection, user_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM receipts WHERE user_id = ?1 AND status = 'verified'",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ============ Bonus Claims ============

/// Create a claim and its receipt row together. Always starts pending.
pub fn create_claim(
    conn: &mut Connection,
    user_id: &str,
    delivery_email: &str,
    receipt_storage_ref: &str,
) -> Result<(BonusClaim, Receipt)> {
    let tx = conn.transaction()?;

    let receipt_id = EntityType::Receipt.gen_id();
    let claim_id = EntityType::BonusClaim.gen_id();
    let ts = now();

    tx.execute(
        "INSERT INTO receipts (id, user_id, storage_ref, status, uploaded_at)
         VALUES (?1, ?2, ?3, 'pending', ?4)",
        params![&receipt_id, user_id, receipt_storage_ref, ts],
    )?;
    // The partial unique index on open claims is the real guard here; two
    // racing submissions cannot both land, whatever the caller pre-checked.
    tx.execute(
        "INSERT INTO bonus_claims (id, user_id, delivery_email, receipt_id, status, submitted_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        params![&claim_id, user_id, delivery_email, &receipt_id, ts],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("A bonus claim already exists for this account".into())
        } else {
            e.into()
        }
    })?;

    tx.commit()?;

    Ok((
        BonusClaim {
            id: claim_id,
            user_id: user_id.to_string(),
            delivery_email: delivery_email.to_string(),
            receipt_id: receipt_id.clone(),
            status: ClaimStatus::Pending,
            submitted_at: ts,
            reviewed_at: None,
            delivered_at: None,
        },
        Receipt {
            id: receipt_id,
            user_id: user_id.to_string(),
            storage_ref: receipt_storage_ref.to_string(),
            status: ReceiptStatus::Pending,
            uploaded_at: ts,
            reviewed_at: None,
        },
    ))
}

pub fn get_claim_by_id(conn: &Connection, id: &str) -> Result<Option<BonusClaim>> {
    query_one(
        conn,
        &format!("SELECT {} FROM bonus_claims WHERE id = ?1", BONUS_CLAIM_COLS),
        &[&id],
    )
}

pub fn list_claims_for_user(conn: &Connection, user_id: &str) -> Result<Vec<BonusClaim>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM bonus_claims WHERE user_id = ?1 ORDER BY submitted_at DESC, id DESC",
            BONUS_CLAIM_COLS
        ),
        &[&user_id],
    )
}

pub fn list_claims_paginated(
    conn: &Connection,
    status: Option<ClaimStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<BonusClaim>, i64)> {
    let status_str = status.map(|s| s.as_str().to_string());
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bonus_claims WHERE (?1 IS NULL OR status = ?1)",
        params![status_str],
        |row| row.get(0),
    )?;

    let claims = query_all(
        conn,
        &format!(
            "SELECT {} FROM bonus_claims
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY submitted_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
            BONUS_CLAIM_COLS
        ),
        &[&status_str, &limit, &offset],
    )?;

    Ok((claims, total))
}

/// Approve a pending claim and grant the pre-order bonus entitlement.
///
/// Requires the linked receipt to already be verified (fail closed on
/// unreviewed uploads). The status transition is conditional on `pending`,
/// so a second concurrent approval loses cleanly and returns `None`.
pub fn approve_claim_atomic(
    conn: &mut Connection,
    claim_id: &str,
) -> Result<Option<(BonusClaim, Entitlement)>> {
    let ts = now();
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let claim: Option<BonusClaim> = query_one(
        &tx,
        &format!("SELECT {} FROM bonus_claims WHERE id = ?1", BONUS_CLAIM_COLS),
        &[&claim_id],
    )?;
    let Some(claim) = claim else {
        return Ok(None);
    };

    let receipt_status: String = tx.query_row(
        "SELECT status FROM receipts WHERE id = ?1",
        params![&claim.receipt_id],
        |row| row.get(0),
    )?;
    if receipt_status != "verified" {
        return Err(AppError::Conflict(
            "Receipt must be verified before the claim can be approved".into(),
        ));
    }

    let affected = tx.execute(
        "UPDATE bonus_claims SET status = 'approved', reviewed_at = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![claim_id, ts],
    )?;
    if affected == 0 {
        return Ok(None);
    }

    let ent_id = EntityType::Entitlement.gen_id();
    tx.execute(
        "INSERT INTO entitlements (id, user_id, entitlement_type, status, code_id, expires_at, fulfilled_at, created_at)
         VALUES (?1, ?2, 'preorder_bonus', 'active', NULL, NULL, ?3, ?3)",
        params![&ent_id, &claim.user_id, ts],
    )?;

    tx.commit()?;

    Ok(Some((
        BonusClaim {
            status: ClaimStatus::Approved,
            reviewed_at: Some(ts),
            ..claim.clone()
        },
        Entitlement {
            id: ent_id,
            user_id: claim.user_id,
            entitlement_type: EntitlementType::PreorderBonus,
            status: EntitlementStatus::Active,
            code_id: None,
            expires_at: None,
            fulfilled_at: ts,
            created_at: ts,
        },
    )))
}

/// Reject a pending claim. Terminal; a rejected claim is never resurrected.
pub fn reject_claim(conn: &Connection, claim_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE bonus_claims SET status = 'rejected', reviewed_at = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![claim_id, now()],
    )?;
    Ok(affected > 0)
}

/// First-delivery transition. Conditional on `approved`; returns false when
/// the claim was not in that state (already delivered, or not deliverable).
/// The caller distinguishes the idempotent already-delivered case.
pub fn try_mark_claim_delivered(conn: &Connection, claim_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE bonus_claims SET status = 'delivered', delivered_at = ?2
         WHERE id = ?1 AND status = 'approved'",
        params![claim_id, now()],
    )?;
    Ok(affected > 0)
}

// ============ Audit Logs ============

#[allow(clippy::too_many_arguments)]
pub fn create_audit_log(
    conn: &Connection,
    enabled: bool,
    actor_type: ActorType,
    actor_id: Option<&str>,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    details: Option<&serde_json::Value>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<()> {
    if !enabled {
        return Ok(());
    }

    let id = EntityType::AuditLog.gen_id();
    let details_str = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO audit_logs (id, timestamp, actor_type, actor_id, action, resource_type, resource_id, details, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &id,
            now(),
            actor_type.as_ref(),
            actor_id,
            action,
            resource_type,
            resource_id,
            details_str,
            ip_address,
            user_agent,
        ],
    )?;
    Ok(())
}

pub fn list_audit_logs_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AuditLog>, i64)> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM audit_logs", [], |row| row.get(0))?;
    let logs = query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs ORDER BY timestamp DESC, id DESC LIMIT ?1 OFFSET ?2",
            AUDIT_LOG_COLS
        ),
        &[&limit, &offset],
    )?;
    Ok((logs, total))
}

/// Delete audit entries older than the retention window. 0 days = keep forever.
pub fn purge_old_audit_logs(conn: &Connection, retention_days: i64) -> Result<usize> {
    if retention_days <= 0 {
        return Ok(0);
    }
    let cutoff = now() - retention_days * 86_400;
    let affected = conn.execute(
        "DELETE FROM audit_logs WHERE timestamp < ?1",
        params![cutoff],
    )?;
    Ok(affected)
}
