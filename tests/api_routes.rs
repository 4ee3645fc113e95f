//! HTTP routes exercised through the router without a listening socket

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tradepilot::application::handlers::journal_handler::build_router;
use tradepilot::application::services::JournalService;
use tradepilot::domain::services::statistics::StatisticsConfig;
use tradepilot::persistence::init_database;

async fn app() -> Router {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let service = Arc::new(JournalService::new(pool, StatisticsConfig::default()));
    build_router(service, 64 * 1024)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn trade_body(ticket: &str, profit: &str) -> Value {
    json!({
        "ticket": ticket,
        "open_time": "2024-05-20T09:00:00",
        "close_time": "2024-05-20T11:30:00",
        "trade_type": "Buy",
        "size": 0.5,
        "item": "EURUSD",
        "price": "1.08",
        "stop_loss": "1.07",
        "take_profit": "1.10",
        "close_price": "1.09",
        "commission": 3.5,
        "profit": profit,
    })
}

async fn registered(app: &Router, name: &str) -> i64 {
    let (status, user) = send(
        app,
        "POST",
        "/users",
        Some(json!({
            "username": name,
            "email": format!("{}@example.com", name),
            "password_hash": "$2b$12$hash",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(user.get("password_hash").is_none());
    user["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_trade_lifecycle() {
    let app = app().await;
    let user_id = registered(&app, "alice").await;
    let trades_uri = format!("/users/{}/trades", user_id);

    let (status, body) = send(&app, "POST", &trades_uri, Some(trade_body("A1", "10.00"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Set up your account"));

    let (status, account) = send(
        &app,
        "PUT",
        &format!("/users/{}/account", user_id),
        Some(json!({ "broker_name": "FTMO", "starting_balance": "1000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["equity"], "1000.00");

    let (status, trade) = send(&app, "POST", &trades_uri, Some(trade_body("A1", "125.50"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(trade["pips"], 1);
    assert_eq!(trade["duration_seconds"], 9000);
    let trade_id = trade["id"].as_i64().unwrap();
    let trade_uri = format!("{}/{}", trades_uri, trade_id);

    let (status, fetched) = send(&app, "GET", &trade_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["profit"], "125.50");
    assert_eq!(fetched["commission"], "3.50");

    let (status, edited) = send(&app, "PUT", &trade_uri, Some(trade_body("B2", "-20"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["ticket"], "A1");

    let (status, dashboard) = send(&app, "GET", &format!("/users/{}/dashboard", user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["account"]["equity"], "980.00");
    assert_eq!(dashboard["summary"]["total_trades"], 1);
    assert_eq!(dashboard["recent_trades"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &trade_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &trade_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, session) = send(&app, "POST", &format!("/users/{}/session", user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["account"]["equity"], "1000.00");
}

#[tokio::test]
async fn test_foreign_trade_is_forbidden() {
    let app = app().await;
    let alice = registered(&app, "alice").await;
    let bob = registered(&app, "bob").await;
    send(
        &app,
        "PUT",
        &format!("/users/{}/account", alice),
        Some(json!({ "starting_balance": 500 })),
    )
    .await;
    let (_, trade) = send(
        &app,
        "POST",
        &format!("/users/{}/trades", alice),
        Some(trade_body("A1", "5")),
    )
    .await;

    let uri = format!("/users/{}/trades/{}", bob, trade["id"]);
    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_trades_with_query() {
    let app = app().await;
    let user_id = registered(&app, "alice").await;
    send(
        &app,
        "PUT",
        &format!("/users/{}/account", user_id),
        Some(json!({ "starting_balance": "1000" })),
    )
    .await;
    for ticket in ["EU-1", "GOLD-2"] {
        send(
            &app,
            "POST",
            &format!("/users/{}/trades", user_id),
            Some(trade_body(ticket, "1")),
        )
        .await;
    }

    let uri = format!(
        "/users/{}/trades?start_date=2024-05-20&end_date=2024-05-20&ticket=GOLD&trade_type=Buy",
        user_id
    );
    let (status, trades) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let trades = trades.as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["ticket"], "GOLD-2");
}

#[tokio::test]
async fn test_bad_input_is_rejected() {
    let app = app().await;
    let user_id = registered(&app, "alice").await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/users/{}/account", user_id),
        Some(json!({ "starting_balance": "-5" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/users",
        Some(json!({ "username": "x", "email": "x@example.com", "password_hash": "h" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/users/999/dashboard", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app().await;
    let user_id = registered(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({ "username": "bob", "email": "bob@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("password_hash"));

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{}/account", user_id),
        Some(json!({ "starting_balance": "lots" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let mut trade = trade_body("A1", "1");
    trade["trade_type"] = json!("Hold");
    let (status, body) = send(&app, "POST", &format!("/users/{}/trades", user_id), Some(trade)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
