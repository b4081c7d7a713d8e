//! Redemption engine tests: refusal classification, entitlement grants,
//! and exactly-once consumption under concurrency.

#[path = "common/mod.rs"]
mod common;
use common::*;

use bookperks::entitlements::resolve;
use bookperks::redemption::{redeem, RedeemError};

#[test]
fn valid_code_grants_entitlement_and_increments_count() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "reader-1");
    let codes = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(3), None);

    let redemption = redeem(&mut conn, &user.id, &codes[0].code).unwrap();

    assert_eq!(redemption.code_type, CodeType::Bonus);
    assert_eq!(redemption.entitlement.entitlement_type, EntitlementType::Bonus);
    assert_eq!(redemption.entitlement.user_id, user.id);
    assert_eq!(redemption.entitlement.code_id.as_deref(), Some(codes[0].id.as_str()));
    assert!(redemption.entitlement.expires_at.is_none());
    assert!(redemption.benefits.contains(&Benefit::Excerpt));
    assert!(redemption.benefits.contains(&Benefit::AgentCharterPack));

    let code = queries::get_code_by_id(&conn, &codes[0].id).unwrap().unwrap();
    assert_eq!(code.redemption_count, 1);
    assert_eq!(code.status, CodeStatus::Active);
}

#[test]
fn code_input_is_normalized_before_lookup() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "reader-2");
    let codes = create_test_codes(&mut conn, CodeType::Preview, 1, Some(1), None);

    // Lowercase with separators, as a person would type it off a card
    let messy = format!(
        "  {}-{}-{} ",
        codes[0].code[0..4].to_lowercase(),
        codes[0].code[4..8].to_lowercase(),
        codes[0].code[8..12].to_lowercase()
    );
    let redemption = redeem(&mut conn, &user.id, &messy).unwrap();
    assert_eq!(redemption.code_type, CodeType::Preview);
}

#[test]
fn preview_entitlements_are_time_boxed() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "reader-3");
    let codes = create_test_codes(&mut conn, CodeType::Preview, 1, Some(1), None);

    let redemption = redeem(&mut conn, &user.id, &codes[0].code).unwrap();
    let expires = redemption.entitlement.expires_at.expect("preview should expire");
    // 90 days out, give or take test runtime
    assert!((expires - future_timestamp(90)).abs() < 60);
}

#[test]
fn malformed_input_never_reaches_the_store() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "reader-4");

    for bad in ["", "short", "WAY-TOO-LONG-FOR-A-CODE-HERE", "ABCDEFGH23!5"] {
        let err = redeem(&mut conn, &user.id, bad).unwrap_err();
        assert!(matches!(err, RedeemError::InvalidFormat), "{bad:?} gave {err:?}");
    }
}

#[test]
fn unknown_and_revoked_codes_are_indistinguishable() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "reader-5");
    let codes = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), None);
    queries::revoke_code(&conn, &codes[0].id).unwrap();

    let unknown = redeem(&mut conn, &user.id, "ABCDEFGH2345").unwrap_err();
    let revoked = redeem(&mut conn, &user.id, &codes[0].code).unwrap_err();

    assert!(matches!(unknown, RedeemError::CodeInvalid));
    assert!(matches!(revoked, RedeemError::CodeInvalid));
    assert_eq!(unknown.to_string(), revoked.to_string());
}

#[test]
fn expired_window_refused_even_while_status_lags() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "reader-6");
    let codes = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), Some(future_timestamp(1)));

    // Window closes but the sweep has not run; status still says active
    conn.execute(
        "UPDATE vip_codes SET valid_until = ?1 WHERE id = ?2",
        rusqlite::params![past_timestamp(1), &codes[0].id],
    )
    .unwrap();

    let err = redeem(&mut conn, &user.id, &codes[0].code).unwrap_err();
    assert!(matches!(err, RedeemError::CodeExpired));

    // The refusal flipped the stored status opportunistically
    let code = queries::get_code_by_id(&conn, &codes[0].id).unwrap().unwrap();
    assert_eq!(code.status, CodeStatus::Expired);
    assert_eq!(code.redemption_count, 0);
}

#[test]
fn exhausted_code_reports_already_redeemed() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let alice = create_test_user(&conn, "alice");
    let bob = create_test_user(&conn, "bob");
    let codes = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), None);

    redeem(&mut conn, &alice.id, &codes[0].code).unwrap();

    let code = queries::get_code_by_id(&conn, &codes[0].id).unwrap().unwrap();
    assert_eq!(code.status, CodeStatus::Redeemed);
    assert_eq!(code.redemption_count, 1);

    let err = redeem(&mut conn, &bob.id, &codes[0].code).unwrap_err();
    assert!(matches!(err, RedeemError::CodeAlreadyRedeemed));
}

#[test]
fn multi_use_code_flips_to_redeemed_exactly_at_ceiling() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let codes = create_test_codes(&mut conn, CodeType::Launch, 1, Some(3), None);

    for i in 0..3 {
        let user = create_test_user(&conn, &format!("launch-reader-{}", i));
        redeem(&mut conn, &user.id, &codes[0].code).unwrap();
    }

    let code = queries::get_code_by_id(&conn, &codes[0].id).unwrap().unwrap();
    assert_eq!(code.redemption_count, 3);
    assert_eq!(code.status, CodeStatus::Redeemed);
    assert_eq!(code.remaining(), Some(0));
}

#[test]
fn unlimited_code_never_exhausts() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let codes = create_test_codes(&mut conn, CodeType::Partner, 1, None, None);

    for i in 0..10 {
        let user = create_test_user(&conn, &format!("partner-reader-{}", i));
        redeem(&mut conn, &user.id, &codes[0].code).unwrap();
    }

    let code = queries::get_code_by_id(&conn, &codes[0].id).unwrap().unwrap();
    assert_eq!(code.redemption_count, 10);
    assert_eq!(code.status, CodeStatus::Active);
}

/// The core concurrency property: a single-use code contested by many
/// threads yields exactly one grant, and the counter never passes the
/// ceiling.
#[test]
fn concurrent_redemption_of_single_use_code_grants_exactly_once() {
    let state = create_test_app_state();
    let code_str;
    let code_id;
    {
        let mut conn = state.db.get().unwrap();
        for i in 0..8 {
            create_test_user(&conn, &format!("racer-{}", i));
        }
        let codes = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), None);
        code_str = codes[0].code.clone();
        code_id = codes[0].id.clone();
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pool = state.db.clone();
            let code = code_str.clone();
            std::thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let user = queries::get_user_by_subject(&conn, &format!("racer-{}", i))
                    .unwrap()
                    .unwrap();
                redeem(&mut conn, &user.id, &code).is_ok()
            })
        })
        .collect();

    let wins: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    assert_eq!(wins, 1, "exactly one thread should win the code");

    let conn = state.db.get().unwrap();
    let code = queries::get_code_by_id(&conn, &code_id).unwrap().unwrap();
    assert_eq!(code.redemption_count, 1);
    assert_eq!(code.status, CodeStatus::Redeemed);

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM entitlements WHERE code_id = ?1",
            rusqlite::params![&code_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1, "exactly one entitlement row for the code");
}

/// Same property for a capacity ceiling above one: N+K contenders, N wins.
#[test]
fn concurrent_redemption_respects_capacity_ceiling() {
    let state = create_test_app_state();
    let code_str;
    let code_id;
    {
        let mut conn = state.db.get().unwrap();
        for i in 0..10 {
            create_test_user(&conn, &format!("crowd-{}", i));
        }
        let codes = create_test_codes(&mut conn, CodeType::Launch, 1, Some(4), None);
        code_str = codes[0].code.clone();
        code_id = codes[0].id.clone();
    }

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let pool = state.db.clone();
            let code = code_str.clone();
            std::thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let user = queries::get_user_by_subject(&conn, &format!("crowd-{}", i))
                    .unwrap()
                    .unwrap();
                redeem(&mut conn, &user.id, &code).is_ok()
            })
        })
        .collect();

    let wins: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum();
    assert_eq!(wins, 4);

    let conn = state.db.get().unwrap();
    let code = queries::get_code_by_id(&conn, &code_id).unwrap().unwrap();
    assert_eq!(code.redemption_count, 4);
    assert_eq!(code.status, CodeStatus::Redeemed);
}

#[test]
fn redemption_at_the_expiry_instant_is_expired() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let user = create_test_user(&conn, "last-second");
    let codes = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), Some(future_timestamp(1)));

    // Window closes exactly now: the wall-clock check and the atomic guard
    // must agree this is expired, not invalid
    conn.execute(
        "UPDATE vip_codes SET valid_until = ?1 WHERE id = ?2",
        rusqlite::params![now(), &codes[0].id],
    )
    .unwrap();

    let code = queries::get_code_by_id(&conn, &codes[0].id).unwrap().unwrap();
    assert!(code.is_past_valid_until(code.valid_until.unwrap()));

    let err = redeem(&mut conn, &user.id, &codes[0].code).unwrap_err();
    assert!(matches!(err, RedeemError::CodeExpired), "got {err:?}");
}

#[test]
fn launch_week_walkthrough() {
    let state = create_test_app_state();
    let mut conn = state.db.get().unwrap();
    let alice = create_test_user(&conn, "alice");
    let bob = create_test_user(&conn, "bob");
    let carol = create_test_user(&conn, "carol");
    let codes = create_test_codes(&mut conn, CodeType::Bonus, 3, Some(1), None);

    // The third code sat in a drawer past its window
    conn.execute(
        "UPDATE vip_codes SET valid_until = ?1 WHERE id = ?2",
        rusqlite::params![past_timestamp(1), &codes[2].id],
    )
    .unwrap();

    // Alice redeems the first code and gets the full bonus bundle
    let first = redeem(&mut conn, &alice.id, &codes[0].code).unwrap();
    assert!(first.benefits.contains(&Benefit::Excerpt));
    assert!(first.benefits.contains(&Benefit::AgentCharterPack));
    let alice_flags = resolve(&conn, &alice.id, now()).unwrap();
    assert!(alice_flags.has_excerpt);
    assert!(alice_flags.has_agent_charter_pack);

    // Bob tries the same single-use code and loses; no grant for him
    let err = redeem(&mut conn, &bob.id, &codes[0].code).unwrap_err();
    assert!(matches!(err, RedeemError::CodeAlreadyRedeemed), "got {err:?}");
    assert_eq!(resolve(&conn, &bob.id, now()).unwrap(), EntitlementFlags::default());

    // Alice redeems a second code: an extra source, same flags
    redeem(&mut conn, &alice.id, &codes[1].code).unwrap();
    assert_eq!(resolve(&conn, &alice.id, now()).unwrap(), alice_flags);
    let alice_ents = queries::list_entitlements_for_user(&conn, &alice.id).unwrap();
    assert_eq!(alice_ents.len(), 2);

    // Carol's expired code refuses distinctly, and she holds nothing
    let err = redeem(&mut conn, &carol.id, &codes[2].code).unwrap_err();
    assert!(matches!(err, RedeemError::CodeExpired), "got {err:?}");
    assert_eq!(resolve(&conn, &carol.id, now()).unwrap(), EntitlementFlags::default());
}
