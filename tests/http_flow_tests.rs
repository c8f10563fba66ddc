//! End-to-end HTTP scenarios against PostgreSQL.
//!
//! Each test gets a fresh database from `#[sqlx::test]` and serves the full
//! router on it. Run with `cargo test -- --ignored`.

use std::sync::Arc;

use license_key_server::{
    AppState, build_router, services::admin_service, services::token_service::TokenIssuer,
};
use reqwest::Client;
use serde_json::{Value, json};
use sqlx::PgPool;

async fn spawn_server(pool: PgPool) -> String {
    let state = AppState {
        pool,
        tokens: Arc::new(
            TokenIssuer::new(b"http-flow-secret", chrono::Duration::hours(24)).unwrap(),
        ),
        admin_session_ttl: chrono::Duration::hours(1),
    };
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

/// Create an admin and return a session secret usable as a bearer token.
async fn admin_session(pool: &PgPool, client: &Client, base: &str) -> String {
    admin_service::ensure_bootstrap_admin(pool, "admin", "admin@localhost", "admin123")
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/admin/login", base))
        .json(&json!({"username": "admin", "password": "admin123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("set-cookie").is_some());

    let body: Value = resp.json().await.unwrap();
    body["session_token"].as_str().unwrap().to_string()
}

async fn create_license(
    client: &Client,
    base: &str,
    session: &str,
    body: Value,
) -> reqwest::Response {
    client
        .post(format!("{}/admin/licenses", base))
        .bearer_auth(session)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn activate(client: &Client, base: &str, key: &str, device_id: &str) -> reqwest::Response {
    client
        .post(format!("{}/activate", base))
        .json(&json!({"license_key": key, "device_id": device_id, "device_info": "Pixel 9"}))
        .send()
        .await
        .unwrap()
}

async fn validate(client: &Client, base: &str, token: &str) -> reqwest::Response {
    client
        .post(format!("{}/validate", base))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn activate_validate_revoke_over_http(pool: PgPool) {
    let base = spawn_server(pool.clone()).await;
    let client = Client::new();
    let session = admin_session(&pool, &client, &base).await;

    let resp = create_license(
        &client,
        &base,
        &session,
        json!({"key": "KEY-A", "duration_days": 7}),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let license: Value = resp.json().await.unwrap();
    assert_eq!(license["key"], "KEY-A");
    assert_eq!(license["status"], "active");
    let license_id = license["id"].as_str().unwrap().to_string();

    let resp = create_license(&client, &base, &session, json!({"key": "KEY-A"})).await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "duplicate_key");

    let resp = activate(&client, &base, "KEY-A", "dev1").await;
    assert_eq!(resp.status(), 200);
    let activated: Value = resp.json().await.unwrap();
    assert_eq!(activated["success"], true);
    assert_eq!(activated["license_status"], "active");
    assert!(activated["expires_at"].is_string());
    let token = activated["token"].as_str().unwrap().to_string();
    assert_eq!(token.split('.').count(), 3);

    let resp = validate(&client, &base, &token).await;
    assert_eq!(resp.status(), 200);
    let validated: Value = resp.json().await.unwrap();
    assert_eq!(validated["valid"], true);
    assert_eq!(validated["license_status"], "active");
    assert_eq!(validated["days_remaining"], 6);
    assert_eq!(validated["expires_at"], activated["expires_at"]);

    let resp = client
        .post(format!("{}/admin/licenses/{}/revoke", base, license_id))
        .bearer_auth(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let revoked: Value = resp.json().await.unwrap();
    assert_eq!(revoked["status"], "revoked");

    let resp = validate(&client, &base, &token).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "revoked");
    assert_eq!(body["error"]["code"], "license_inactive");

    let resp = activate(&client, &base, "KEY-A", "dev1").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "revoked");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn expired_license_reports_status_over_http(pool: PgPool) {
    let base = spawn_server(pool.clone()).await;
    let client = Client::new();
    let session = admin_session(&pool, &client, &base).await;

    let resp = create_license(
        &client,
        &base,
        &session,
        json!({"key": "KEY-B", "duration_days": 7}),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let resp = activate(&client, &base, "KEY-B", "dev2").await;
    assert_eq!(resp.status(), 200);
    let activated: Value = resp.json().await.unwrap();
    let token = activated["token"].as_str().unwrap().to_string();

    sqlx::query("UPDATE licenses SET expires_at = NOW() - INTERVAL '1 minute' WHERE key = 'KEY-B'")
        .execute(&pool)
        .await
        .unwrap();

    // First check performs the transition, later checks see it stored
    for code in ["license_expired", "license_inactive"] {
        let resp = validate(&client, &base, &token).await;
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "expired");
        assert_eq!(body["error"]["code"], code);
    }

    let resp = client
        .get(format!("{}/admin/licenses", base))
        .bearer_auth(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let licenses: Value = resp.json().await.unwrap();
    assert_eq!(licenses[0]["key"], "KEY-B");
    assert_eq!(licenses[0]["status"], "expired");
}
