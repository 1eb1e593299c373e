use axum::extract::State;
use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::permissions;
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::jwt::AuthUser;
use crate::models::pagination::Pagination;
use crate::models::student::{Student, StudentCreateRequest, StudentPublic, StudentUpdateRequest};
use crate::utils::{require_text, utc_now};

const STUDENT_COLUMNS: &str = "user_id, phone, birthday, student_group_id, created_at, updated_at";

const PUBLIC_SELECT: &str =
    "SELECT s.user_id, u.first_name, u.last_name, u.middle_name, s.birthday, s.student_group_id \
     FROM students s JOIN users u ON u.user_id = s.user_id";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/students",
            get(list_students.layer(state.require(permissions::STUDENT_LIST)))
                .post(create_student.layer(state.require(permissions::STUDENT_CREATE))),
        )
        .route(
            "/students/public",
            get(list_public_students.layer(state.require(permissions::STUDENT_LIST_PUBLIC))),
        )
        .route(
            "/students/public/:id",
            get(get_public_student.layer(state.require(permissions::STUDENT_VIEW_PUBLIC))),
        )
        .route(
            "/students/:id",
            get(get_student.layer(state.require(permissions::STUDENT_VIEW)))
                .put(update_student.layer(state.require(permissions::STUDENT_UPDATE)))
                .delete(delete_student.layer(state.require(permissions::STUDENT_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/students",
    tag = "Students",
    request_body = StudentCreateRequest,
    responses(
        (status = 201, description = "Student profile created", body = Student),
        (status = 400, description = "Unknown user or group"),
        (status = 409, description = "User already has a student profile")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_student(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<StudentCreateRequest>,
) -> AppResult<(StatusCode, Json<Student>)> {
    require_text("phone", &payload.phone)?;
    let now = utc_now();

    sqlx::query(
        "INSERT INTO students (user_id, phone, birthday, student_group_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.user_id)
    .bind(&payload.phone)
    .bind(payload.birthday)
    .bind(payload.student_group_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let student = fetch_student(&state.pool, payload.user_id).await?;
    state.audit.created(auth.user_id, &student);

    Ok((StatusCode::CREATED, Json(student)))
}

#[utoipa::path(
    get,
    path = "/api/v1/students",
    tag = "Students",
    params(Pagination),
    responses((status = 200, description = "List students", body = [Student])),
    security(("bearerAuth" = []))
)]
pub async fn list_students(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<Student>>> {
    let students = sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students ORDER BY user_id LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(students))
}

#[utoipa::path(
    get,
    path = "/api/v1/students/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student user id")),
    responses(
        (status = 200, description = "Student detail", body = Student),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_student(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Student>> {
    Ok(Json(fetch_student(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/students/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student user id")),
    request_body = StudentUpdateRequest,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_student(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<StudentUpdateRequest>,
) -> AppResult<Json<Student>> {
    require_text("phone", &payload.phone)?;
    let old = fetch_student(&state.pool, id).await?;

    sqlx::query(
        "UPDATE students SET phone = ?, birthday = ?, student_group_id = ?, updated_at = ? WHERE user_id = ?",
    )
    .bind(&payload.phone)
    .bind(payload.birthday)
    .bind(payload.student_group_id)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let student = fetch_student(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &student);

    Ok(Json(student))
}

#[utoipa::path(
    delete,
    path = "/api/v1/students/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student user id")),
    responses(
        (status = 204, description = "Student profile deleted"),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_student(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_student(&state.pool, id).await?;

    sqlx::query("DELETE FROM students WHERE user_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/students/public",
    tag = "Students",
    params(Pagination),
    responses((status = 200, description = "Public student directory", body = [StudentPublic])),
    security(("bearerAuth" = []))
)]
pub async fn list_public_students(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<StudentPublic>>> {
    let students = sqlx::query_as::<_, StudentPublic>(&format!(
        "{PUBLIC_SELECT} ORDER BY u.last_name, u.first_name LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(students))
}

#[utoipa::path(
    get,
    path = "/api/v1/students/public/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student user id")),
    responses(
        (status = 200, description = "Public student card", body = StudentPublic),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_public_student(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<StudentPublic>> {
    let student = sqlx::query_as::<_, StudentPublic>(&format!("{PUBLIC_SELECT} WHERE s.user_id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("student not found"))?;

    Ok(Json(student))
}

async fn fetch_student(pool: &SqlitePool, user_id: i64) -> AppResult<Student> {
    sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("student not found"))
}
