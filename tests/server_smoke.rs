use anyhow::{Context, Result};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::tempdir;

use edu_journal::create_app;

/// Serves the real router on an ephemeral port and talks to it over HTTP.
#[tokio::test]
async fn served_over_tcp() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("smoke.db");
    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool).await?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    let base = format!("http://{}", addr);
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/health")).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.headers().get("x-request-id").is_some(), "request id missing");
    let health: Value = resp.json().await?;
    assert_eq!(health["db_ok"], true);

    let resp = client
        .post(format!("{base}/api/v1/register"))
        .json(&json!({"first_name": "Net", "last_name": "User", "email": "net@example.com", "password": "password123"}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let auth: Value = resp.json().await?;
    let token = auth["token"].as_str().context("missing token")?;

    let resp = client.get(format!("{base}/api/v1/me")).bearer_auth(token).send().await?;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = client.get(format!("{base}/api/v1/users")).bearer_auth(token).send().await?;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = client.get(format!("{base}/api-docs/openapi.json")).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let doc: Value = resp.json().await?;
    assert!(doc["paths"]["/api/v1/gradejournals"].is_object());

    Ok(())
}
