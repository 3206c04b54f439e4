//! Router-level tests against SQLite in memory.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use rstest::rstest;
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use tally_api::{AppState, create_router};
use tally_db::migration::{Migrator, MigratorTrait};
use tally_shared::settings::{AccountSettings, Boundary, LedgerSettings, PaymentSettings};
use tower::ServiceExt;

fn settings() -> LedgerSettings {
    LedgerSettings {
        payment: PaymentSettings {
            boundary: Boundary {
                upper: Some(15_000),
                lower: Some(-2_000),
            },
        },
        account: AccountSettings {
            boundary: Boundary {
                upper: Some(200_000),
                lower: Some(-20_000),
            },
        },
        ..LedgerSettings::default()
    }
}

async fn app() -> Router {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    create_router(AppState::new(db, settings()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/api/user", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["user"]["id"].as_str().unwrap().to_string()
}

async fn deposit(app: &Router, user: &str, amount: i64) -> Value {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/user/{user}/transaction"),
        Some(json!({ "amount": amount })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["transaction"].clone()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_settings_exposes_boundaries() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/settings", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["payment"]["boundary"]["upper"], 15_000);
    assert_eq!(body["settings"]["account"]["boundary"]["lower"], -20_000);
    assert_eq!(body["settings"]["undo"]["timeout"], "5 minutes");
}

#[tokio::test]
async fn test_register_user() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/user",
        Some(json!({ "name": "  alice ", "email": "alice@example.org" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["name"], "alice");
    assert_eq!(body["user"]["balance"], 0);
    assert_eq!(body["user"]["isActive"], false);
    assert_eq!(body["user"]["isDisabled"], false);
    assert!(body["user"]["updated"].is_null());

    let id = body["user"]["id"].as_str().unwrap();
    let (status, body) = send(&app, "GET", &format!("/api/user/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.org");
}

#[rstest]
#[case("")]
#[case("   ")]
#[tokio::test]
async fn test_register_rejects_blank_name(#[case] name: &str) {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/api/user", Some(json!({ "name": name }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_duplicate_name_conflicts() {
    let app = app().await;
    register(&app, "alice").await;

    let (status, body) = send(&app, "POST", "/api/user", Some(json!({ "name": "alice" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");
}

#[tokio::test]
async fn test_disabled_users_hidden_from_listing() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    register(&app, "bob").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}"),
        Some(json!({ "isDisabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isDisabled"], true);

    let (_, body) = send(&app, "GET", "/api/user", None).await;
    let names: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bob"]);

    let (_, body) = send(&app, "GET", "/api/user?disabled=true", None).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_users_by_activity() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    register(&app, "bob").await;
    deposit(&app, &alice, 100).await;

    let names = |body: &Value| -> Vec<String> {
        body["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["name"].as_str().unwrap().to_string())
            .collect()
    };

    let (status, body) = send(&app, "GET", "/api/user?active=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["alice"]);

    let (_, body) = send(&app, "GET", "/api/user?active=false", None).await;
    assert_eq!(names(&body), vec!["bob"]);

    let (_, body) = send(&app, "GET", "/api/user", None).await;
    assert_eq!(names(&body), vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_update_user_fields() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    let uri = format!("/api/user/{alice}");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(json!({ "name": "alicia", "email": "alicia@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "alicia");
    assert_eq!(body["user"]["email"], "alicia@example.org");
    assert_eq!(body["user"]["isDisabled"], false);

    let (_, body) = send(&app, "POST", &uri, Some(json!({ "email": "" }))).await;
    assert_eq!(body["user"]["name"], "alicia");
    assert!(body["user"]["email"].is_null());
}

#[tokio::test]
async fn test_rename_to_taken_name_conflicts() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    register(&app, "bob").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}"),
        Some(json!({ "name": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}"),
        Some(json!({ "name": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = app().await;
    let id = tally_shared::types::UserId::new();

    let (status, body) = send(&app, "GET", &format!("/api/user/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{id}/transaction"),
        Some(json!({ "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_deposit_updates_balance() {
    let app = app().await;
    let alice = register(&app, "alice").await;

    let transaction = deposit(&app, &alice, 1_000).await;
    assert_eq!(transaction["amount"], 1_000);
    assert_eq!(transaction["user"]["balance"], 1_000);
    assert_eq!(transaction["user"]["isActive"], true);
    assert_eq!(transaction["isDeleted"], false);
    assert_eq!(transaction["isDeletable"], true);
    assert!(transaction["article"].is_null());

    let created = transaction["created"].as_str().unwrap();
    assert_eq!(created.len(), "2026-01-01 00:00:00".len());
    assert!(!created.contains('T'));
}

#[tokio::test]
async fn test_purchase_with_quantity() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    deposit(&app, &alice, 1_000).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/article",
        Some(json!({ "name": "Club Mate", "barcode": "4029764001807", "amount": 300 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let article = body["article"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}/transaction"),
        Some(json!({ "articleId": article, "quantity": 2, "comment": "thirsty" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction"]["amount"], -600);
    assert_eq!(body["transaction"]["quantity"], 2);
    assert_eq!(body["transaction"]["comment"], "thirsty");
    assert_eq!(body["transaction"]["user"]["balance"], 400);
    assert_eq!(body["transaction"]["article"]["usageCount"], 1);

    let (_, body) = send(&app, "GET", &format!("/api/article/{article}"), None).await;
    assert_eq!(body["article"]["usageCount"], 1);
}

#[tokio::test]
async fn test_transfer_links_both_sides() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    deposit(&app, &alice, 1_000).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}/transaction"),
        Some(json!({ "amount": -250, "recipientId": bob })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let sender = &body["transaction"];
    assert_eq!(sender["amount"], -250);
    assert_eq!(sender["user"]["balance"], 750);
    assert!(sender["senderTransactionId"].is_null());

    let recipient_tx = sender["recipientTransactionId"].as_str().unwrap();
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/user/{bob}/transaction/{recipient_tx}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["amount"], 250);
    assert_eq!(body["transaction"]["user"]["balance"], 250);
    assert_eq!(body["transaction"]["senderTransactionId"], sender["id"]);
}

#[tokio::test]
async fn test_positive_transfer_is_rejected() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}/transaction"),
        Some(json!({ "amount": 250, "recipientId": bob })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_OPERATION");
}

#[rstest]
#[case(15_001, "TRANSACTION_BOUNDARY_EXCEEDED")]
#[case(-2_001, "TRANSACTION_BOUNDARY_EXCEEDED")]
#[case(-1_500, "ACCOUNT_BALANCE_BOUNDARY_EXCEEDED")]
#[tokio::test]
async fn test_boundary_violations(#[case] amount: i64, #[case] code: &str) {
    let app = app().await;
    let alice = register(&app, "alice").await;
    for _ in 0..13 {
        deposit(&app, &alice, -1_500).await;
    }

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}/transaction"),
        Some(json!({ "amount": amount })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], code);

    let (_, body) = send(&app, "GET", &format!("/api/user/{alice}"), None).await;
    assert_eq!(body["user"]["balance"], -19_500);
}

#[tokio::test]
async fn test_list_transactions_paged_newest_first() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    for amount in 1..=5 {
        deposit(&app, &alice, amount).await;
    }

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/user/{alice}/transaction?page=1&per_page=2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let amounts: Vec<i64> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|transaction| transaction["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![5, 4]);
    assert_eq!(body["meta"]["total"], 5);
    assert_eq!(body["meta"]["total_pages"], 3);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/user/{alice}/transaction?page=3&per_page=2"),
        None,
    )
    .await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_revert_transaction() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    deposit(&app, &alice, 1_000).await;
    let transaction = deposit(&app, &alice, 300).await;
    let id = transaction["id"].as_str().unwrap();
    let uri = format!("/api/user/{alice}/transaction/{id}");

    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["isDeleted"], true);
    assert_eq!(body["transaction"]["isDeletable"], false);
    assert_eq!(body["transaction"]["user"]["balance"], 1_000);

    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "TRANSACTION_NOT_DELETABLE");
}

#[tokio::test]
async fn test_revert_requires_owner() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let transaction = deposit(&app, &alice, 300).await;
    let id = transaction["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/user/{bob}/transaction/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "TRANSACTION_NOT_FOUND");
}

#[tokio::test]
async fn test_article_update_creates_version() {
    let app = app().await;
    let (_, body) = send(
        &app,
        "POST",
        "/api/article",
        Some(json!({ "name": "Mate", "barcode": "123", "amount": 200 })),
    )
    .await;
    let original = body["article"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/article/{original}"),
        Some(json!({ "name": "Mate", "barcode": "123", "amount": 250 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["precursorId"], original.as_str());
    assert_eq!(body["article"]["amount"], 250);

    let (_, body) = send(&app, "GET", "/api/article", None).await;
    let articles = body["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["amount"], 250);

    let (_, body) = send(&app, "GET", "/api/article?inactive=true", None).await;
    assert_eq!(body["articles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_inactive_article_cannot_be_bought() {
    let app = app().await;
    let alice = register(&app, "alice").await;
    let (_, body) = send(
        &app,
        "POST",
        "/api/article",
        Some(json!({ "name": "Mate", "amount": 200 })),
    )
    .await;
    let article = body["article"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "DELETE", &format!("/api/article/{article}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["isActive"], false);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/user/{alice}/transaction"),
        Some(json!({ "articleId": article })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "ARTICLE_INACTIVE");
}
