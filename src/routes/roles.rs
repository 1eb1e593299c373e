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
use crate::models::rbac::{Role, RoleRequest};
use crate::utils::{require_text, utc_now};

const ROLE_COLUMNS: &str = "role_id, role_name, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/roles",
            get(list_roles.layer(state.require(permissions::ROLE_LIST)))
                .post(create_role.layer(state.require(permissions::ROLE_CREATE))),
        )
        .route(
            "/roles/:id",
            get(get_role.layer(state.require(permissions::ROLE_VIEW)))
                .put(update_role.layer(state.require(permissions::ROLE_UPDATE)))
                .delete(delete_role.layer(state.require(permissions::ROLE_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    tag = "RBAC",
    request_body = RoleRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    require_text("role_name", &payload.role_name)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO roles (role_name, created_at, updated_at) VALUES (?, ?, ?)",
    )
    .bind(payload.role_name.trim())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let role = fetch_role(&state.pool, id).await?;
    state.audit.created(auth.user_id, &role);

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "RBAC",
    params(Pagination),
    responses((status = 200, description = "List roles", body = [Role])),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, ApiQuery(page): ApiQuery<Pagination>) -> AppResult<Json<Vec<Role>>> {
    let roles = sqlx::query_as::<_, Role>(&format!(
        "SELECT {ROLE_COLUMNS} FROM roles ORDER BY role_name LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(roles))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role detail", body = Role),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Role>> {
    Ok(Json(fetch_role(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Role id")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Role renamed", body = Role),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> AppResult<Json<Role>> {
    require_text("role_name", &payload.role_name)?;
    let old = fetch_role(&state.pool, id).await?;

    sqlx::query("UPDATE roles SET role_name = ?, updated_at = ? WHERE role_id = ?")
        .bind(payload.role_name.trim())
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let role = fetch_role(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &role);

    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted with its assignments and grants"),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_role(&state.pool, id).await?;

    sqlx::query("DELETE FROM roles WHERE role_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_role(pool: &SqlitePool, id: i64) -> AppResult<Role> {
    sqlx::query_as::<_, Role>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE role_id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))
}
