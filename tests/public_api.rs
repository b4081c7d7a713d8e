//! HTTP-level tests for the public API surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[path = "common/mod.rs"]
mod common;
use common::*;

fn authed_post(uri: &str, subject: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-auth-subject", subject)
        .header("x-auth-email", format!("{}@example.com", subject))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str, subject: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-auth-subject", subject)
        .header("x-auth-email", format!("{}@example.com", subject))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn redeem_without_identity_headers_is_unauthorized() {
    let state = create_test_app_state();
    let app = public_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/redeem")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "code": "ABCDEFGH2345" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Sign in required");
}

#[tokio::test]
async fn redeem_valid_code_returns_created_with_benefits() {
    let state = create_test_app_state();
    let code = {
        let mut conn = state.db.get().unwrap();
        create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), None)[0]
            .code
            .clone()
    };
    let app = public_app(state);

    let response = app
        .oneshot(authed_post("/redeem", "reader", json!({ "code": code })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["code_type"], "bonus");
    assert_eq!(body["entitlement"]["entitlement_type"], "bonus");
    let benefits = body["benefits"].as_array().unwrap();
    assert!(benefits.contains(&json!("excerpt")));
    assert!(benefits.contains(&json!("agent_charter_pack")));
}

#[tokio::test]
async fn redeem_error_classification_over_http() {
    let state = create_test_app_state();
    let (expired_code, used_code) = {
        let mut conn = state.db.get().unwrap();
        let expired =
            create_test_codes(&mut conn, CodeType::Bonus, 1, None, Some(future_timestamp(1)))[0]
                .clone();
        conn.execute(
            "UPDATE vip_codes SET valid_until = ?1 WHERE id = ?2",
            rusqlite::params![past_timestamp(1), &expired.id],
        )
        .unwrap();

        let used = create_test_codes(&mut conn, CodeType::Bonus, 1, Some(1), None)[0].clone();
        let user = create_test_user(&conn, "early-bird");
        bookperks::redemption::redeem(&mut conn, &user.id, &used.code).unwrap();

        (expired.code, used.code)
    };

    let cases = [
        (json!({ "code": "nope" }), StatusCode::BAD_REQUEST, "invalid_format"),
        (json!({ "code": "ABCDEFGH2345" }), StatusCode::NOT_FOUND, "code_invalid"),
        (json!({ "code": expired_code }), StatusCode::GONE, "code_expired"),
        (json!({ "code": used_code }), StatusCode::CONFLICT, "code_already_redeemed"),
    ];

    for (body, expected_status, expected_error) in cases {
        let app = public_app(state.clone());
        let response = app
            .oneshot(authed_post("/redeem", "late-comer", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), expected_status, "for body {}", body);
        let json = body_json(response).await;
        assert_eq!(json["error"], expected_error);
    }
}

#[tokio::test]
async fn entitlements_endpoint_returns_full_flag_struct() {
    let state = create_test_app_state();
    let code = {
        let mut conn = state.db.get().unwrap();
        create_test_codes(&mut conn, CodeType::Preview, 1, Some(1), None)[0]
            .code
            .clone()
    };

    // Before redeeming: all false
    let response = public_app(state.clone())
        .oneshot(authed_get("/entitlements", "flag-reader"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["has_excerpt"], false);
    assert_eq!(body["has_agent_charter_pack"], false);
    assert_eq!(body["has_preordered"], false);

    public_app(state.clone())
        .oneshot(authed_post("/redeem", "flag-reader", json!({ "code": code })))
        .await
        .unwrap();

    let response = public_app(state)
        .oneshot(authed_get("/entitlements", "flag-reader"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["has_excerpt"], true);
    assert_eq!(body["has_agent_charter_pack"], false);
}

#[tokio::test]
async fn claim_submit_and_fetch_own_claim() {
    let state = create_test_app_state();

    let response = public_app(state.clone())
        .oneshot(authed_post(
            "/claims",
            "claimer",
            json!({
                "delivery_email": "claimer@example.com",
                "receipt_ref": "uploads/r.pdf"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let claim_id = body["claim"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["claim"]["status"], "pending");
    assert_eq!(body["receipt"]["status"], "pending");

    // Owner sees it
    let response = public_app(state.clone())
        .oneshot(authed_get(&format!("/claims/{}", claim_id), "claimer"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Anyone else gets 404, not 403
    let response = public_app(state)
        .oneshot(authed_get(&format!("/claims/{}", claim_id), "snooper"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_flow_claim_approve_link_download() {
    let state = create_test_app_state();
    let link = {
        let mut conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "flow-claimant");
        let (claim, receipt) = create_test_claim(&mut conn, &user.id);
        queries::review_receipt(&conn, &receipt.id, ReceiptStatus::Verified).unwrap();
        bookperks::claims::approve_claim(&mut conn, &claim.id).unwrap();
        bookperks::claims::issue_download_link(&conn, Some(TEST_TOKEN_SECRET), &claim.id).unwrap()
    };

    // The download itself needs no identity headers, only the token
    let response = public_app(state.clone())
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/assets/agent-charter-pack?token={}", link.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["asset_id"], "agent-charter-pack");
    assert_eq!(body["filename"], "agent-charter-pack.zip");
    assert_eq!(body["content_type"], "application/zip");

    // First fetch flipped the claim to delivered
    let conn = state.db.get().unwrap();
    let delivered = queries::get_claim_by_id(&conn, &link.claim.id)
        .unwrap()
        .unwrap();
    assert_eq!(delivered.status, ClaimStatus::Delivered);
}

#[tokio::test]
async fn download_for_a_pending_claim_is_forbidden() {
    let state = create_test_app_state();
    let token = {
        let mut conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "eager-claimant");
        let (claim, _) = create_test_claim(&mut conn, &user.id);
        bookperks::token::issue_token(
            Some(TEST_TOKEN_SECRET),
            &claim.id,
            &claim.delivery_email,
            "agent-charter-pack",
        )
        .unwrap()
    };

    let response = public_app(state)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/assets/agent-charter-pack?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn download_of_unknown_asset_is_not_found() {
    let state = create_test_app_state();

    let response = public_app(state)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/assets/director-cut?token=whatever.sig")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_with_garbage_token_is_unauthorized() {
    let state = create_test_app_state();

    let response = public_app(state)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/assets/sample-chapter?token=not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn downloads_fail_closed_without_a_secret() {
    let mut state = create_test_app_state();
    state.download_token_secret = None;

    let response = public_app(state)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/assets/sample-chapter?token=whatever.sig")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
