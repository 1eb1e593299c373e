use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::tempdir;
use tower::util::ServiceExt;

use edu_journal::audit::verify_chain;
use edu_journal::authz::roles;
use edu_journal::create_app;
use edu_journal::db::seed::{grant_role, seed_rbac};

async fn send(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
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

async fn register(app: &Router, first_name: &str, email: &str) -> Result<(i64, String)> {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"first_name": first_name, "last_name": "Tester", "email": email, "password": "password123"}).to_string(),
        ))?;
    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    if status != StatusCode::CREATED {
        panic!("register failed: {} - {}", status, String::from_utf8_lossy(&bytes));
    }
    let v: Value = serde_json::from_slice(&bytes)?;
    let user_id = v["user"]["user_id"].as_i64().context("missing user id")?;
    let token = v["token"].as_str().context("missing token")?.to_string();
    Ok((user_id, token))
}

fn id_of(v: &Value, key: &str) -> Result<i64> {
    v[key].as_i64().with_context(|| format!("missing {key} in {v}"))
}

#[tokio::test]
async fn grade_journal_full_flow() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("records.db");
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

    let (_, admin) = register(&app, "Admin", "admin@school.test").await?;
    let (teacher_id, teacher) = register(&app, "Grace", "grace@school.test").await?;
    let (student_id, student) = register(&app, "Alan", "alan@school.test").await?;
    grant_role(&pool, "admin@school.test", roles::ADMIN).await?;
    grant_role(&pool, "grace@school.test", roles::TEACHER).await?;
    grant_role(&pool, "alan@school.test", roles::STUDENT).await?;

    // -- academic year: ordering enforced
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/academic-years",
        &admin,
        Some(json!({"start_with": "2025-06-30", "ends_with": "2024-09-01"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, year) = send(
        &app,
        "POST",
        "/api/v1/academic-years",
        &admin,
        Some(json!({"start_with": "2024-09-01", "ends_with": "2025-06-30"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "academic year create failed: {year}");
    let year_id = id_of(&year, "academic_year_id")?;

    // -- teacher profile, group, student, discipline
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/teacher",
        &admin,
        Some(json!({"user_id": teacher_id, "phone": "+100200300", "education": "PhD"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "teacher create failed: {body}");

    let (status, group) = send(
        &app,
        "POST",
        "/api/v1/student-groups",
        &admin,
        Some(json!({"student_group_name": "CS-101", "curator_id": teacher_id, "academic_year_id": year_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "group create failed: {group}");
    let group_id = id_of(&group, "student_group_id")?;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/students",
        &admin,
        Some(json!({"user_id": student_id, "phone": "+100200301", "birthday": "2005-04-12", "student_group_id": group_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "student create failed: {body}");

    let (status, discipline) = send(
        &app,
        "POST",
        "/api/v1/disciplines",
        &admin,
        Some(json!({"discipline_name": "Linear Algebra", "teacher_id": teacher_id, "student_group_id": group_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "discipline create failed: {discipline}");
    let discipline_id = id_of(&discipline, "discipline_id")?;

    // -- the teacher role can read its own profile but not create disciplines
    let (status, me) = send(&app, "GET", "/api/v1/teacher/me", &teacher, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user_id"], teacher_id);
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/disciplines",
        &teacher,
        Some(json!({"discipline_name": "Sneaky", "teacher_id": teacher_id, "student_group_id": group_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, public) = send(&app, "GET", &format!("/api/v1/disciplines/public/{discipline_id}"), &student, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["teacher_first_name"], "Grace");
    assert_eq!(public["academic_year_id"], year_id);

    // -- grades: range and references are checked
    for bad in [0, 101] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/gradejournals",
            &teacher,
            Some(json!({"student_id": student_id, "discipline_id": discipline_id, "grade": bad})),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "grade {bad} accepted: {body}");
    }
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/gradejournals",
        &teacher,
        Some(json!({"student_id": 9999, "discipline_id": discipline_id, "grade": 50})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut grade_ids = Vec::new();
    for grade in [80, 90] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/gradejournals",
            &teacher,
            Some(json!({"student_id": student_id, "discipline_id": discipline_id, "grade": grade, "comment": "midterm"})),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "grade create failed: {body}");
        grade_ids.push(id_of(&body, "grade_journal_id")?);
    }

    let (status, avg) = send(
        &app,
        "GET",
        &format!("/api/v1/gradejournals/average?student_id={student_id}&discipline_id={discipline_id}"),
        &student,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(avg["count"], 2);
    assert!((avg["average"].as_f64().unwrap_or_default() - 85.0).abs() < f64::EPSILON);

    let tomorrow = (Utc::now() + chrono::Duration::days(1)).date_naive();
    let (status, avg) = send(&app, "GET", &format!("/api/v1/gradejournals/average?from_date={tomorrow}"), &student, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(avg["count"], 0);
    assert_eq!(avg["average"], 0.0);

    let (status, list) = send(&app, "GET", "/api/v1/gradejournals?limit=1", &teacher, None).await?;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().context("expected list")?;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["grade_journal_id"], grade_ids[1], "newest grade should come first");

    let (status, public) = send(
        &app,
        "GET",
        &format!("/api/v1/gradejournals/public?student_id={student_id}"),
        &student,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let public = public.as_array().context("expected list")?;
    assert_eq!(public.len(), 2);
    assert_eq!(public[0]["first_name"], "Alan");
    assert_eq!(public[0]["discipline_name"], "Linear Algebra");

    // students cannot edit grades
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/gradejournals/{}", grade_ids[0]),
        &student,
        Some(json!({"student_id": student_id, "discipline_id": discipline_id, "grade": 100})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/v1/gradejournals/{}", grade_ids[0]),
        &teacher,
        Some(json!({"student_id": student_id, "discipline_id": discipline_id, "grade": 70, "comment": "retake"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "grade update failed: {updated}");
    assert_eq!(updated["grade"], 70);

    // only admin holds gradejournal:delete
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/gradejournals/{}", grade_ids[0]), &teacher, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/gradejournals/{}", grade_ids[0]), &admin, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "GET", &format!("/api/v1/gradejournals/{}", grade_ids[0]), &teacher, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["error"], "grade not found");

    // -- audit trail: every mutation above, chained
    let grade_rows = wait_for(&pool, "SELECT COUNT(*) FROM audit_log WHERE table_name = 'grade_journals'", 4).await?;
    assert_eq!(grade_rows, 4, "two creates, one update, one delete");

    let (status, logs) = send(&app, "GET", "/api/v1/audit-logs?table_name=grade_journals", &admin, None).await?;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().context("expected list")?;
    assert_eq!(logs[0]["action_type"], "DELETE");
    assert!(logs[0]["old_data"].as_str().unwrap_or_default().contains("retake"));

    let (status, _) = send(&app, "GET", "/api/v1/audit-logs", &teacher, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(verify_chain(&pool).await?, None);

    Ok(())
}

async fn wait_for(pool: &SqlitePool, sql: &str, expected: i64) -> Result<i64> {
    let mut count = 0;
    for _ in 0..50 {
        count = sqlx::query_scalar(sql).fetch_one(pool).await?;
        if count >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(count)
}
