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
use crate::models::student_group::{StudentGroup, StudentGroupPublic, StudentGroupRequest};
use crate::utils::{require_text, utc_now};

const GROUP_COLUMNS: &str =
    "student_group_id, student_group_name, curator_id, academic_year_id, created_at, updated_at";

const PUBLIC_SELECT: &str = "SELECT g.student_group_id, g.student_group_name, g.curator_id, \
     c.first_name AS curator_first_name, c.last_name AS curator_last_name, c.middle_name AS curator_middle_name, \
     g.academic_year_id \
     FROM student_groups g JOIN users c ON c.user_id = g.curator_id";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/student-groups",
            get(list_groups.layer(state.require(permissions::STUDENT_GROUP_LIST)))
                .post(create_group.layer(state.require(permissions::STUDENT_GROUP_CREATE))),
        )
        .route(
            "/student-groups/public",
            get(list_public_groups.layer(state.require(permissions::STUDENT_GROUP_LIST_PUBLIC))),
        )
        .route(
            "/student-groups/public/:id",
            get(get_public_group.layer(state.require(permissions::STUDENT_GROUP_VIEW_PUBLIC))),
        )
        .route(
            "/student-groups/:id",
            get(get_group.layer(state.require(permissions::STUDENT_GROUP_VIEW)))
                .put(update_group.layer(state.require(permissions::STUDENT_GROUP_UPDATE)))
                .delete(delete_group.layer(state.require(permissions::STUDENT_GROUP_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/student-groups",
    tag = "Student groups",
    request_body = StudentGroupRequest,
    responses(
        (status = 201, description = "Group created", body = StudentGroup),
        (status = 409, description = "Group name already taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<StudentGroupRequest>,
) -> AppResult<(StatusCode, Json<StudentGroup>)> {
    require_text("student_group_name", &payload.student_group_name)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO student_groups (student_group_name, curator_id, academic_year_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.student_group_name.trim())
    .bind(payload.curator_id)
    .bind(payload.academic_year_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let group = fetch_group(&state.pool, id).await?;
    state.audit.created(auth.user_id, &group);

    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-groups",
    tag = "Student groups",
    params(Pagination),
    responses((status = 200, description = "List groups", body = [StudentGroup])),
    security(("bearerAuth" = []))
)]
pub async fn list_groups(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<StudentGroup>>> {
    let groups = sqlx::query_as::<_, StudentGroup>(&format!(
        "SELECT {GROUP_COLUMNS} FROM student_groups ORDER BY student_group_id LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(groups))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-groups/{id}",
    tag = "Student groups",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group detail", body = StudentGroup),
        (status = 404, description = "Group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_group(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<StudentGroup>> {
    Ok(Json(fetch_group(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/student-groups/{id}",
    tag = "Student groups",
    params(("id" = i64, Path, description = "Group id")),
    request_body = StudentGroupRequest,
    responses(
        (status = 200, description = "Group updated", body = StudentGroup),
        (status = 404, description = "Group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_group(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<StudentGroupRequest>,
) -> AppResult<Json<StudentGroup>> {
    require_text("student_group_name", &payload.student_group_name)?;
    let old = fetch_group(&state.pool, id).await?;

    sqlx::query(
        "UPDATE student_groups SET student_group_name = ?, curator_id = ?, academic_year_id = ?, updated_at = ? \
         WHERE student_group_id = ?",
    )
    .bind(payload.student_group_name.trim())
    .bind(payload.curator_id)
    .bind(payload.academic_year_id)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let group = fetch_group(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &group);

    Ok(Json(group))
}

#[utoipa::path(
    delete,
    path = "/api/v1/student-groups/{id}",
    tag = "Student groups",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 400, description = "Group still referenced by students or disciplines"),
        (status = 404, description = "Group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_group(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_group(&state.pool, id).await?;

    sqlx::query("DELETE FROM student_groups WHERE student_group_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/student-groups/public",
    tag = "Student groups",
    params(Pagination),
    responses((status = 200, description = "Groups with curator names", body = [StudentGroupPublic])),
    security(("bearerAuth" = []))
)]
pub async fn list_public_groups(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<StudentGroupPublic>>> {
    let groups = sqlx::query_as::<_, StudentGroupPublic>(&format!(
        "{PUBLIC_SELECT} ORDER BY g.student_group_name LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(groups))
}

#[utoipa::path(
    get,
    path = "/api/v1/student-groups/public/{id}",
    tag = "Student groups",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group with curator name", body = StudentGroupPublic),
        (status = 404, description = "Group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_public_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<StudentGroupPublic>> {
    let group = sqlx::query_as::<_, StudentGroupPublic>(&format!("{PUBLIC_SELECT} WHERE g.student_group_id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("student group not found"))?;

    Ok(Json(group))
}

async fn fetch_group(pool: &SqlitePool, id: i64) -> AppResult<StudentGroup> {
    sqlx::query_as::<_, StudentGroup>(&format!(
        "SELECT {GROUP_COLUMNS} FROM student_groups WHERE student_group_id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("student group not found"))
}
