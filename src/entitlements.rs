//! The entitlement resolver: fold a user's live entitlements into the flag
//! set the site gates on. Pure read; never mutates rows. Expiry is checked
//! against the wall clock here even when the background sweep has not yet
//! flipped a row's persisted status.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::models::{Benefit, EntitlementFlags, EntitlementType};

/// Resolve the benefit flags for a user at `now`.
///
/// Flags OR together across entitlements: one live source of a benefit is
/// enough, extra sources change nothing. A user with no rows gets the
/// all-false struct, never a missing field.
///
/// `has_preordered` is wider than the entitlement rows: a verified receipt
/// alone proves the pre-order even while the claim it backs is still in
/// review, so readers see the flag as soon as verification lands.
pub fn resolve(conn: &Connection, user_id: &str, now: i64) -> Result<EntitlementFlags> {
    let live = queries::list_live_entitlements_for_user(conn, user_id, now)?;

    let mut flags = EntitlementFlags::default();
    for ent in &live {
        for benefit in ent.entitlement_type.benefits() {
            match benefit {
                Benefit::Excerpt => flags.has_excerpt = true,
                Benefit::AgentCharterPack => flags.has_agent_charter_pack = true,
            }
        }
        if ent.entitlement_type == EntitlementType::PreorderBonus {
            flags.has_preordered = true;
        }
    }

    if !flags.has_preordered && queries::has_verified_receipt(conn, user_id)? {
        flags.has_preordered = true;
    }

    Ok(flags)
}
