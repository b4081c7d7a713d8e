//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models can implement to
//! define how they are constructed from database rows, plus helper functions
//! for common query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// This provides graceful error handling instead of panicking when database
/// contains invalid enum values (from corruption, migration errors, etc.).
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    /// Construct an instance from a database row.
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, subject, email, created_at, updated_at";

pub const ADMIN_COLS: &str = "id, email, name, role, key_hash, created_at, revoked_at";

pub const VIP_CODE_COLS: &str = "id, code, code_type, status, max_redemptions, redemption_count, valid_from, valid_until, description, batch_id, created_at";

pub const ENTITLEMENT_COLS: &str =
    "id, user_id, entitlement_type, status, code_id, expires_at, fulfilled_at, created_at";

pub const RECEIPT_COLS: &str = "id, user_id, storage_ref, status, uploaded_at, reviewed_at";

pub const BONUS_CLAIM_COLS: &str =
    "id, user_id, delivery_email, receipt_id, status, submitted_at, reviewed_at, delivered_at";

pub const AUDIT_LOG_COLS: &str = "id, timestamp, actor_type, actor_id, action, resource_type, resource_id, details, ip_address, user_agent";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            subject: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl FromRow for Admin {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Admin {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: parse_enum(row, 3, "role")?,
            key_hash: row.get(4)?,
            created_at: row.get(5)?,
            revoked_at: row.get(6)?,
        })
    }
}

impl FromRow for VipCode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(VipCode {
            id: row.get(0)?,
            code: row.get(1)?,
            code_type: parse_enum(row, 2, "code_type")?,
            status: parse_enum(row, 3, "status")?,
            max_redemptions: row.get(4)?,
            redemption_count: row.get(5)?,
            valid_from: row.get(6)?,
            valid_until: row.get(7)?,
            description: row.get(8)?,
            batch_id: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for Entitlement {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Entitlement {
            id: row.get(0)?,
            user_id: row.get(1)?,
            entitlement_type: parse_enum(row, 2, "entitlement_type")?,
            status: parse_enum(row, 3, "status")?,
            code_id: row.get(4)?,
            expires_at: row.get(5)?,
            fulfilled_at: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for Receipt {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Receipt {
            id: row.get(0)?,
            user_id: row.get(1)?,
            storage_ref: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            uploaded_at: row.get(4)?,
            reviewed_at: row.get(5)?,
        })
    }
}

impl FromRow for BonusClaim {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BonusClaim {
            id: row.get(0)?,
            user_id: row.get(1)?,
            delivery_email: row.get(2)?,
            receipt_id: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            submitted_at: row.get(5)?,
            reviewed_at: row.get(6)?,
            delivered_at: row.get(7)?,
        })
    }
}

impl FromRow for AuditLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let details: Option<String> = row.get(7)?;
        Ok(AuditLog {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            actor_type: parse_enum(row, 2, "actor_type")?,
            actor_id: row.get(3)?,
            action: row.get(4)?,
            resource_type: row.get(5)?,
            resource_id: row.get(6)?,
            details: details.and_then(|d| serde_json::from_str(&d).ok()),
            ip_address: row.get(8)?,
            user_agent: row.get(9)?,
        })
    }
}
