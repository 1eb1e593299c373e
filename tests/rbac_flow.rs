use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

use edu_journal::audit::verify_chain;
use edu_journal::authz::roles;
use edu_journal::create_app;
use edu_journal::db::seed::{grant_role, seed_rbac};

async fn setup() -> Result<(TempDir, SqlitePool, Router)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("rbac.db");
    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;
    seed_rbac(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((dir, pool, app))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

/// Registers and logs in; returns `(user_id, token)`.
async fn register_and_login(app: &Router, email: &str, password: &str) -> Result<(i64, String)> {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/register",
        None,
        Some(json!({"first_name": "Test", "last_name": "User", "email": email, "password": password})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    let user_id = body["user"]["user_id"].as_i64().context("missing user id")?;

    let (status, body) = send(app, "POST", "/api/v1/login", None, Some(json!({"email": email, "password": password}))).await?;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    let token = body["token"].as_str().context("missing token")?.to_string();
    Ok((user_id, token))
}

async fn role_id(pool: &SqlitePool, name: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT role_id FROM roles WHERE role_name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?)
}

async fn wait_for_audit_rows(pool: &SqlitePool, expected: i64) -> Result<i64> {
    let mut count = 0;
    for _ in 0..50 {
        count = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log").fetch_one(pool).await?;
        if count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(count)
}

#[tokio::test]
async fn role_assignment_opens_the_guarded_route() -> Result<()> {
    let (_dir, pool, app) = setup().await?;
    let (_, token) = register_and_login(&app, "a@x.com", "pw123456").await?;

    // no roles yet
    let (status, body) = send(&app, "GET", "/api/v1/users", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission denied");
    assert_eq!(body["code"], "forbidden");

    assert!(grant_role(&pool, "a@x.com", roles::ADMIN).await?);

    // same token, next request
    let (status, body) = send(&app, "GET", "/api/v1/users", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "admin list failed: {body}");
    let users = body.as_array().context("expected a list body")?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "a@x.com");

    // malformed path and query values get the same JSON error body
    let (status, body) = send(&app, "GET", "/api/v1/users/abc", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(body["error"].as_str().is_some_and(|e| e.starts_with("invalid path parameter")), "{body}");

    let (status, body) = send(&app, "GET", "/api/v1/users?limit=abc", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(body["error"].as_str().is_some_and(|e| e.starts_with("invalid query string")), "{body}");

    Ok(())
}

#[tokio::test]
async fn removing_a_role_takes_effect_on_the_next_request() -> Result<()> {
    let (_dir, pool, app) = setup().await?;
    let (_, admin_token) = register_and_login(&app, "admin@x.com", "pw123456").await?;
    let (student_id, student_token) = register_and_login(&app, "student@x.com", "pw123456").await?;
    grant_role(&pool, "admin@x.com", roles::ADMIN).await?;
    let admin_role = role_id(&pool, roles::ADMIN).await?;

    let link = json!({"user_id": student_id, "role_id": admin_role});
    let (status, _) = send(&app, "POST", "/api/v1/user-roles/assign", Some(&admin_token), Some(link.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "GET", "/api/v1/roles", Some(&student_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    // assigning twice is a conflict
    let (status, _) = send(&app, "POST", "/api/v1/user-roles/assign", Some(&admin_token), Some(link.clone())).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/api/v1/user-roles/remove", Some(&admin_token), Some(link.clone())).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/v1/roles", Some(&student_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // nothing left to remove
    let (status, _) = send(&app, "POST", "/api/v1/user-roles/remove", Some(&admin_token), Some(link)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // two registrations, assign, remove
    let count = wait_for_audit_rows(&pool, 4).await?;
    assert_eq!(count, 4);
    let actions: Vec<String> = sqlx::query_scalar("SELECT action_type FROM audit_log ORDER BY audit_id")
        .fetch_all(&pool)
        .await?;
    assert_eq!(actions[2..], ["ASSIGN".to_string(), "REMOVE".to_string()]);
    assert_eq!(verify_chain(&pool).await?, None);

    Ok(())
}

#[tokio::test]
async fn stored_permission_casing_does_not_matter() -> Result<()> {
    let (_dir, pool, app) = setup().await?;
    let (_, admin_token) = register_and_login(&app, "admin@x.com", "pw123456").await?;
    let (auditor_id, auditor_token) = register_and_login(&app, "auditor@x.com", "pw123456").await?;
    grant_role(&pool, "admin@x.com", roles::ADMIN).await?;

    let (status, role) = send(&app, "POST", "/api/v1/roles", Some(&admin_token), Some(json!({"role_name": "auditor"}))).await?;
    assert_eq!(status, StatusCode::CREATED, "role create failed: {role}");
    let auditor_role = role["role_id"].as_i64().context("missing role id")?;

    // the seeded name is `auditlog:list`; this one differs only in case
    sqlx::query("UPDATE permissions SET permission_name = 'AuditLog:List' WHERE permission_name = 'auditlog:list'")
        .execute(&pool)
        .await?;
    let permission_id: i64 = sqlx::query_scalar("SELECT permission_id FROM permissions WHERE permission_name = 'AuditLog:List'")
        .fetch_one(&pool)
        .await?;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/role-permissions/assign",
        Some(&admin_token),
        Some(json!({"role_id": auditor_role, "permission_id": permission_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    // the listing carries the stored name untouched
    let (status, granted) = send(
        &app,
        "GET",
        &format!("/api/v1/role-permissions/{auditor_role}"),
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "role permission list failed: {granted}");
    let granted = granted.as_array().context("expected a list body")?;
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0]["permission_id"], permission_id);
    assert_eq!(granted[0]["permission_name"], "AuditLog:List");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/user-roles/assign",
        Some(&admin_token),
        Some(json!({"user_id": auditor_id, "role_id": auditor_role})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/v1/audit-logs", Some(&auditor_token), None).await?;
    assert_eq!(status, StatusCode::OK, "audit log list failed: {body}");
    assert!(body.is_array());

    // the role grants nothing else
    let (status, _) = send(&app, "GET", "/api/v1/users", Some(&auditor_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn permission_names_must_be_resource_action() -> Result<()> {
    let (_dir, pool, app) = setup().await?;
    let (_, token) = register_and_login(&app, "admin@x.com", "pw123456").await?;
    grant_role(&pool, "admin@x.com", roles::ADMIN).await?;

    let (status, _) = send(&app, "POST", "/api/v1/permissions", Some(&token), Some(json!({"permission_name": "grades"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/permissions",
        Some(&token),
        Some(json!({"permission_name": "report:export"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "permission create failed: {created}");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/permissions",
        Some(&token),
        Some(json!({"permission_name": "report:export"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}
