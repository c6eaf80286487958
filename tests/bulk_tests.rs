use actix_web::{App, http::StatusCode, test};
use overtime::configure_app;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

mod common;

const BASE: &str = "/api/v1/overtime-submissions";

#[actix_web::test]
async fn test_bulk_approve_skips_ineligible() {
    // Arrange: two pending for boss, one pending for another supervisor
    let mut ctx = common::TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &ctx.state))).await;
    let owner = ctx.token("owner@plant.test", &[]);
    let boss = ctx.token("boss@plant.test", &[]);

    let mut ids = Vec::new();
    for supervisor in ["boss@plant.test", "boss@plant.test", "other@plant.test"] {
        let resp = test::call_service(
            &app,
            common::insert_request(&owner, &common::standard_submission(supervisor)).to_request(),
        )
        .await;
        ids.push(common::id_of(&common::read_json(resp).await.1));
    }
    ids.push(Uuid::new_v4());

    // Act
    let resp = test::call_service(
        &app,
        common::post(&format!("{BASE}/bulk/approve"), &boss, json!({ "ids": ids })).to_request(),
    )
    .await;
    let (status, body) = common::read_json(resp).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": "approved", "count": 2, "total": 4 }));
    assert_eq!(ctx.drain_notifications().len(), 2);

    // Nothing left for the same caller
    let resp = test::call_service(
        &app,
        common::post(&format!("{BASE}/bulk/approve"), &boss, json!({ "ids": ids })).to_request(),
    )
    .await;
    let (status, error) = common::read_json(resp).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error, json!({ "error": "no valid submissions" }));
}

#[actix_web::test]
async fn test_bulk_reject_requires_reason() {
    let ctx = common::TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &ctx.state))).await;
    let hr = ctx.token("hr@plant.test", &["hr"]);

    let resp = test::call_service(
        &app,
        common::post(
            &format!("{BASE}/bulk/reject"),
            &hr,
            json!({ "ids": [Uuid::new_v4()], "reason": "   " }),
        )
        .to_request(),
    )
    .await;
    let (status, error) = common::read_json(resp).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error, json!({ "error": "reason required" }));
}

#[actix_web::test]
async fn test_bulk_mark_as_accounted_by_hr() {
    let ctx = common::TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &ctx.state))).await;
    let owner = ctx.token("owner@plant.test", &[]);
    let boss = ctx.token("boss@plant.test", &[]);
    let hr = ctx.token("hr@plant.test", &["hr"]);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let resp = test::call_service(
            &app,
            common::insert_request(&owner, &common::standard_submission("boss@plant.test"))
                .to_request(),
        )
        .await;
        ids.push(common::id_of(&common::read_json(resp).await.1));
    }
    let resp = test::call_service(
        &app,
        common::post(
            &format!("{BASE}/bulk/approve"),
            &boss,
            json!({ "ids": &ids[..2] }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        common::post(&format!("{BASE}/bulk/accounted"), &hr, json!({ "ids": ids })).to_request(),
    )
    .await;
    let (status, body) = common::read_json(resp).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": "accounted", "count": 2, "total": 3 }));
}

#[actix_web::test]
async fn test_bulk_cancel_only_own_submissions() {
    let ctx = common::TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &ctx.state))).await;
    let owner = ctx.token("owner@plant.test", &[]);
    let other = ctx.token("someone@plant.test", &[]);

    let mut ids = Vec::new();
    for token in [&owner, &other] {
        let resp = test::call_service(
            &app,
            common::insert_request(token, &common::standard_submission("boss@plant.test"))
                .to_request(),
        )
        .await;
        ids.push(common::id_of(&common::read_json(resp).await.1));
    }

    let resp = test::call_service(
        &app,
        common::post(&format!("{BASE}/bulk/cancel"), &owner, json!({ "ids": ids })).to_request(),
    )
    .await;
    let (status, body) = common::read_json(resp).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": "cancelled", "count": 1, "total": 2 }));
}
