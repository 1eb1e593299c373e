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
use crate::models::teacher::{Teacher, TeacherCreateRequest, TeacherPublic, TeacherUpdateRequest};
use crate::utils::{require_text, utc_now};

const TEACHER_COLUMNS: &str = "user_id, phone, working_experience, education, created_at, updated_at";

const PUBLIC_SELECT: &str = "SELECT t.user_id, u.first_name, u.last_name, u.middle_name, t.education \
     FROM teachers t JOIN users u ON u.user_id = t.user_id";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/teacher",
            get(list_teachers.layer(state.require(permissions::TEACHER_LIST)))
                .post(create_teacher.layer(state.require(permissions::TEACHER_CREATE))),
        )
        .route(
            "/teacher/me",
            get(get_own_profile.layer(state.require(permissions::TEACHER_VIEW_SELF)))
                .put(update_own_profile.layer(state.require(permissions::TEACHER_UPDATE_SELF))),
        )
        .route(
            "/teacher/public",
            get(list_public_teachers.layer(state.require(permissions::TEACHER_LIST_PUBLIC))),
        )
        .route(
            "/teacher/public/:id",
            get(get_public_teacher.layer(state.require(permissions::TEACHER_VIEW_PUBLIC))),
        )
        .route(
            "/teacher/:id",
            get(get_teacher.layer(state.require(permissions::TEACHER_VIEW)))
                .put(update_teacher.layer(state.require(permissions::TEACHER_UPDATE)))
                .delete(delete_teacher.layer(state.require(permissions::TEACHER_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/teacher",
    tag = "Teachers",
    request_body = TeacherCreateRequest,
    responses(
        (status = 201, description = "Teacher profile created", body = Teacher),
        (status = 400, description = "Unknown user"),
        (status = 409, description = "User already has a teacher profile")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_teacher(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<TeacherCreateRequest>,
) -> AppResult<(StatusCode, Json<Teacher>)> {
    require_text("phone", &payload.phone)?;
    let now = utc_now();

    sqlx::query(
        "INSERT INTO teachers (user_id, phone, working_experience, education, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.user_id)
    .bind(&payload.phone)
    .bind(&payload.working_experience)
    .bind(&payload.education)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let teacher = fetch_teacher(&state.pool, payload.user_id).await?;
    state.audit.created(auth.user_id, &teacher);

    Ok((StatusCode::CREATED, Json(teacher)))
}

#[utoipa::path(
    get,
    path = "/api/v1/teacher",
    tag = "Teachers",
    params(Pagination),
    responses((status = 200, description = "List teachers", body = [Teacher])),
    security(("bearerAuth" = []))
)]
pub async fn list_teachers(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<Teacher>>> {
    let teachers = sqlx::query_as::<_, Teacher>(&format!(
        "SELECT {TEACHER_COLUMNS} FROM teachers ORDER BY user_id LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(teachers))
}

#[utoipa::path(
    get,
    path = "/api/v1/teacher/{id}",
    tag = "Teachers",
    params(("id" = i64, Path, description = "Teacher user id")),
    responses(
        (status = 200, description = "Teacher detail", body = Teacher),
        (status = 404, description = "Teacher not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_teacher(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Teacher>> {
    Ok(Json(fetch_teacher(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/teacher/{id}",
    tag = "Teachers",
    params(("id" = i64, Path, description = "Teacher user id")),
    request_body = TeacherUpdateRequest,
    responses(
        (status = 200, description = "Teacher updated", body = Teacher),
        (status = 404, description = "Teacher not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_teacher(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<TeacherUpdateRequest>,
) -> AppResult<Json<Teacher>> {
    apply_update(&state, auth.user_id, id, payload).await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/v1/teacher/{id}",
    tag = "Teachers",
    params(("id" = i64, Path, description = "Teacher user id")),
    responses(
        (status = 204, description = "Teacher profile deleted"),
        (status = 404, description = "Teacher not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_teacher(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_teacher(&state.pool, id).await?;

    sqlx::query("DELETE FROM teachers WHERE user_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own teacher profile.
#[utoipa::path(
    get,
    path = "/api/v1/teacher/me",
    tag = "Teachers",
    responses(
        (status = 200, description = "Own teacher profile", body = Teacher),
        (status = 404, description = "Caller has no teacher profile")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_own_profile(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Teacher>> {
    Ok(Json(fetch_teacher(&state.pool, auth.user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/teacher/me",
    tag = "Teachers",
    request_body = TeacherUpdateRequest,
    responses(
        (status = 200, description = "Own teacher profile updated", body = Teacher),
        (status = 404, description = "Caller has no teacher profile")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_own_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<TeacherUpdateRequest>,
) -> AppResult<Json<Teacher>> {
    apply_update(&state, auth.user_id, auth.user_id, payload).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/api/v1/teacher/public",
    tag = "Teachers",
    params(Pagination),
    responses((status = 200, description = "Public teacher directory", body = [TeacherPublic])),
    security(("bearerAuth" = []))
)]
pub async fn list_public_teachers(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<TeacherPublic>>> {
    let teachers = sqlx::query_as::<_, TeacherPublic>(&format!(
        "{PUBLIC_SELECT} ORDER BY u.last_name, u.first_name LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(teachers))
}

#[utoipa::path(
    get,
    path = "/api/v1/teacher/public/{id}",
    tag = "Teachers",
    params(("id" = i64, Path, description = "Teacher user id")),
    responses(
        (status = 200, description = "Public teacher card", body = TeacherPublic),
        (status = 404, description = "Teacher not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_public_teacher(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<TeacherPublic>> {
    let teacher = sqlx::query_as::<_, TeacherPublic>(&format!("{PUBLIC_SELECT} WHERE t.user_id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("teacher not found"))?;

    Ok(Json(teacher))
}

async fn apply_update(
    state: &AppState,
    actor: i64,
    teacher_id: i64,
    payload: TeacherUpdateRequest,
) -> AppResult<Teacher> {
    require_text("phone", &payload.phone)?;
    let old = fetch_teacher(&state.pool, teacher_id).await?;

    sqlx::query(
        "UPDATE teachers SET phone = ?, working_experience = ?, education = ?, updated_at = ? WHERE user_id = ?",
    )
    .bind(&payload.phone)
    .bind(&payload.working_experience)
    .bind(&payload.education)
    .bind(utc_now())
    .bind(teacher_id)
    .execute(&state.pool)
    .await?;

    let teacher = fetch_teacher(&state.pool, teacher_id).await?;
    state.audit.updated(actor, &old, &teacher);
    Ok(teacher)
}

async fn fetch_teacher(pool: &SqlitePool, user_id: i64) -> AppResult<Teacher> {
    sqlx::query_as::<_, Teacher>(&format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE user_id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("teacher not found"))
}
