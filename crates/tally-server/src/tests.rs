//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tally_core::Database;
use tower::ServiceExt;

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";

fn setup_test_app() -> Router {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        require_auth: false,
        allowed_origins: vec![],
        ..Default::default()
    };
    create_router(db, None, config)
}

/// App that requires auth, with one API key for Bob
fn setup_auth_app() -> Router {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        require_auth: true,
        api_keys: parse_api_keys(&format!("{}=bob-secret-key", BOB)),
        ..Default::default()
    };
    create_router(db, None, config)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_as(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header(CF_ACCESS_USER_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(CF_ACCESS_USER_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn delete_as(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(user) = user {
        builder = builder.header(CF_ACCESS_USER_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

fn salary(amount: &str) -> serde_json::Value {
    serde_json::json!({
        "date": "2024-09-05",
        "income_source": "Salary",
        "category": "Work",
        "amount": amount,
        "period": "2024-09"
    })
}

fn expense(source: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "date": "2024-09-01",
        "expense_source": source,
        "amount": amount,
        "period": "2024-09"
    })
}

// ========== Access Gate Tests ==========

#[tokio::test]
async fn test_unauthenticated_request_rejected() {
    let app = setup_auth_app();

    let response = app
        .oneshot(get_as("/api/incomes?period=2024-09", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");
    assert_eq!(json["kind"], "unauthenticated");
}

#[tokio::test]
async fn test_unauthenticated_write_touches_nothing() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig::default();
    let app = create_router(db.clone(), None, config);

    let response = app
        .oneshot(send_json("POST", "/api/incomes", None, salary("1000.00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let owner = Owner::from_session(Some(ALICE)).unwrap();
    assert!(db.list_available_periods(&owner).unwrap().is_empty());
    assert_eq!(db.list_owners().unwrap().len(), 0);
}

#[tokio::test]
async fn test_me_with_cloudflare_header() {
    let app = setup_auth_app();

    let response = app.oneshot(get_as("/api/me", Some(ALICE))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["user"], ALICE);
    assert_eq!(json["auth_method"], "cloudflare_header");
}

#[tokio::test]
async fn test_me_with_api_key() {
    let app = setup_auth_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("authorization", "Bearer bob-secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["user"], BOB);
    assert_eq!(json["auth_method"], "api_key");
}

#[tokio::test]
async fn test_wrong_api_key_rejected() {
    let app = setup_auth_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("authorization", "Bearer bob-secret-kez")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_auth_acts_as_local_dev() {
    let app = setup_test_app();

    let response = app.oneshot(get_as("/api/me", None)).await.unwrap();

    let json = get_body_json(response).await;
    assert_eq!(json["user"], LOCAL_DEV_OWNER);
    assert_eq!(json["auth_method"], "none");
}

#[test]
fn test_parse_api_keys() {
    let keys = parse_api_keys(" a@x.com = k1 ,broken,, job=k2,=nokey");
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].owner, "a@x.com");
    assert_eq!(keys[0].key, "k1");
    assert_eq!(keys[1].owner, "job");

    assert_eq!(owner_for_api_key("k2", &keys), Some("job"));
    assert_eq!(owner_for_api_key("k3", &keys), None);
    assert_eq!(owner_for_api_key("", &keys), None);
}

// ========== Record + Summary Tests ==========

#[tokio::test]
async fn test_create_income_returns_summary() {
    let app = setup_test_app();

    let response = app
        .oneshot(send_json("POST", "/api/incomes", None, salary("1000.00")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["record"]["income_source"], "Salary");
    assert_eq!(json["record"]["amount"], "1000.00");
    assert_eq!(json["record"]["owner"], LOCAL_DEV_OWNER);
    assert_eq!(json["summary"]["total_income"], "1000.00");
    assert_eq!(json["summary"]["balance"], "1000.00");
}

#[tokio::test]
async fn test_month_flow() {
    let app = setup_test_app();

    let income = get_body_json(
        app.clone()
            .oneshot(send_json("POST", "/api/incomes", None, salary("1000.00")))
            .await
            .unwrap(),
    )
    .await;
    let income_id = income["record"]["id"].as_i64().unwrap();

    let rent = get_body_json(
        app.clone()
            .oneshot(send_json(
                "POST",
                "/api/fixed-expenses",
                None,
                expense("Rent", "300.00"),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(rent["record"]["kind"], "fixed");
    let rent_id = rent["record"]["id"].as_i64().unwrap();

    let groceries = get_body_json(
        app.clone()
            .oneshot(send_json(
                "POST",
                "/api/variable-expenses",
                None,
                expense("Groceries", "150.50"),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(groceries["summary"]["balance"], "549.50");

    // Raise the income
    let updated = get_body_json(
        app.clone()
            .oneshot(send_json(
                "PATCH",
                &format!("/api/incomes/{}", income_id),
                None,
                serde_json::json!({ "amount": "1200.00" }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(updated["record"]["amount"], "1200.00");
    assert_eq!(updated["summary"]["balance"], "749.50");

    // Delete the rent
    let response = app
        .clone()
        .oneshot(delete_as(&format!("/api/fixed-expenses/{}", rent_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = get_body_json(response).await;
    assert_eq!(deleted["success"], true);
    assert_eq!(deleted["summary"]["total_fixed_expense"], "0.00");
    assert_eq!(deleted["summary"]["balance"], "1049.50");

    // Bundle shows everything for the month
    let bundle = get_body_json(
        app.clone()
            .oneshot(get_as("/api/months/2024-09", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(bundle["incomes"].as_array().unwrap().len(), 1);
    assert!(bundle["fixed_expenses"].as_array().unwrap().is_empty());
    assert_eq!(bundle["variable_expenses"].as_array().unwrap().len(), 1);
    assert_eq!(bundle["summary"]["total_income"], "1200.00");

    let months = get_body_json(app.oneshot(get_as("/api/months", None)).await.unwrap()).await;
    assert_eq!(months[0]["period"], "2024-09");
    assert_eq!(months[0]["label"], "September 2024");
}

#[tokio::test]
async fn test_summary_is_null_for_untouched_month() {
    let app = setup_test_app();

    let response = app
        .oneshot(get_as("/api/months/2031-01/summary", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json.is_null());
}

#[tokio::test]
async fn test_analysis_endpoint() {
    let app = setup_test_app();

    app.clone()
        .oneshot(send_json("POST", "/api/incomes", None, salary("1000")))
        .await
        .unwrap();
    app.clone()
        .oneshot(send_json(
            "POST",
            "/api/fixed-expenses",
            None,
            expense("Rent", "600"),
        ))
        .await
        .unwrap();

    let json = get_body_json(
        app.oneshot(get_as("/api/months/2024-09/analysis", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["status"], "excellent");
    assert_eq!(json["fixed_level"], "high");
    assert_eq!(json["advice"], "reduce_fixed");
}

// ========== Error Mapping Tests ==========

#[tokio::test]
async fn test_validation_error_is_400_with_field() {
    let app = setup_test_app();

    let response = app
        .oneshot(send_json("POST", "/api/incomes", None, salary("0")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["kind"], "validation");
    assert_eq!(json["field"], "amount");
}

#[tokio::test]
async fn test_bad_period_in_path_is_400() {
    let app = setup_test_app();

    let response = app
        .oneshot(get_as("/api/months/2024-13", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["field"], "period");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/incomes")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_record_is_404() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(get_as("/api/incomes/999", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["kind"], "not_found");

    let response = app
        .oneshot(delete_as("/api/variable-expenses/999", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_path_and_query_use_json_errors() {
    let app = setup_test_app();

    for uri in ["/api/incomes/abc", "/api/fixed-expenses/1.5", "/api/audit?limit=x"] {
        let response = app.clone().oneshot(get_as(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let json = get_body_json(response).await;
        assert_eq!(json["kind"], "validation", "{}", uri);
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    }
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_committed_write() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let app = create_router(db.clone(), None, config);

    db.conn()
        .unwrap()
        .execute_batch("DROP TABLE audit_log;")
        .unwrap();

    let response = app
        .oneshot(send_json("POST", "/api/incomes", None, salary("40")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["summary"]["total_income"], "40.00");

    let owner = Owner::from_session(Some(LOCAL_DEV_OWNER)).unwrap();
    let sep = tally_core::Period::parse("2024-09").unwrap();
    assert_eq!(db.list_incomes(&owner, &sep).unwrap().len(), 1);
}

#[tokio::test]
async fn test_income_categories_and_month_short_label() {
    let app = setup_test_app();

    let json = get_body_json(
        app.clone()
            .oneshot(get_as("/api/income-categories", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json[0], "Salary");
    assert_eq!(json.as_array().unwrap().len(), 8);

    app.clone()
        .oneshot(send_json("POST", "/api/incomes", None, salary("1")))
        .await
        .unwrap();
    let months = get_body_json(app.oneshot(get_as("/api/months", None)).await.unwrap()).await;
    assert_eq!(months[0]["short_label"], "Sep");
}

// ========== Isolation Tests ==========

#[tokio::test]
async fn test_owners_never_see_each_other() {
    let app = setup_auth_app();

    let created = get_body_json(
        app.clone()
            .oneshot(send_json("POST", "/api/incomes", Some(ALICE), salary("1000")))
            .await
            .unwrap(),
    )
    .await;
    let id = created["record"]["id"].as_i64().unwrap();

    // Bob cannot list, read, change or delete Alice's income
    let list = get_body_json(
        app.clone()
            .oneshot(get_as("/api/incomes?period=2024-09", Some(BOB)))
            .await
            .unwrap(),
    )
    .await;
    assert!(list.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(get_as(&format!("/api/incomes/{}", id), Some(BOB)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/incomes/{}", id),
            Some(BOB),
            serde_json::json!({ "amount": "1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(delete_as(&format!("/api/incomes/{}", id), Some(BOB)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let summary = get_body_json(
        app.clone()
            .oneshot(get_as("/api/months/2024-09/summary", Some(BOB)))
            .await
            .unwrap(),
    )
    .await;
    assert!(summary.is_null());

    // Alice still has her income
    let summary = get_body_json(
        app.oneshot(get_as("/api/months/2024-09/summary", Some(ALICE)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(summary["total_income"], "1000.00");
}

#[tokio::test]
async fn test_owner_field_in_body_is_ignored() {
    let app = setup_auth_app();

    let mut body = salary("10");
    body["owner"] = serde_json::json!(BOB);
    let created = get_body_json(
        app.oneshot(send_json("POST", "/api/incomes", Some(ALICE), body))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(created["record"]["owner"], ALICE);
}

// ========== Currency Tests ==========

#[tokio::test]
async fn test_currency_preference() {
    let app = setup_test_app();

    let json = get_body_json(
        app.clone()
            .oneshot(get_as("/api/preferences/currency", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["currency"], "CRC");
    assert_eq!(json["info"]["symbol"], "₡");

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/preferences/currency",
            None,
            serde_json::json!({ "currency": "XXX" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["field"], "currency");

    let json = get_body_json(
        app.clone()
            .oneshot(send_json(
                "PUT",
                "/api/preferences/currency",
                None,
                serde_json::json!({ "currency": "USD" }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["currency"], "USD");

    let json = get_body_json(
        app.oneshot(get_as("/api/preferences/currency", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["currency"], "USD");
}

#[tokio::test]
async fn test_list_currencies() {
    let app = setup_test_app();

    let json = get_body_json(app.oneshot(get_as("/api/currencies", None)).await.unwrap()).await;
    let currencies = json.as_array().unwrap();
    assert_eq!(currencies.len(), 12);
    assert_eq!(currencies[0]["code"], "CRC");
}

// ========== Audit Tests ==========

#[tokio::test]
async fn test_audit_log_lists_own_entries() {
    let app = setup_auth_app();

    app.clone()
        .oneshot(send_json("POST", "/api/incomes", Some(ALICE), salary("10")))
        .await
        .unwrap();
    app.clone()
        .oneshot(get_as("/api/months", Some(BOB)))
        .await
        .unwrap();

    let json = get_body_json(
        app.oneshot(get_as("/api/audit?limit=50", Some(ALICE)))
            .await
            .unwrap(),
    )
    .await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[0]["entity_type"], "income");
}
