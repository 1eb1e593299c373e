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
use crate::models::rbac::{Permission, PermissionRequest};
use crate::utils::utc_now;

const PERMISSION_COLUMNS: &str = "permission_id, permission_name, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/permissions",
            get(list_permissions.layer(state.require(permissions::PERMISSION_LIST)))
                .post(create_permission.layer(state.require(permissions::PERMISSION_CREATE))),
        )
        .route(
            "/permissions/:id",
            get(get_permission.layer(state.require(permissions::PERMISSION_VIEW)))
                .put(update_permission.layer(state.require(permissions::PERMISSION_UPDATE)))
                .delete(delete_permission.layer(state.require(permissions::PERMISSION_DELETE))),
        )
}

/// Permission names are `resource:action`; storage keeps the casing given.
fn validate_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    match name.split_once(':') {
        Some((resource, action)) if !resource.is_empty() && !action.is_empty() && !action.contains(':') => Ok(name),
        _ => Err(AppError::bad_request("permission_name must look like resource:action")),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/permissions",
    tag = "RBAC",
    request_body = PermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 400, description = "Name is not resource:action"),
        (status = 409, description = "Permission already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<PermissionRequest>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    let name = validate_name(&payload.permission_name)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO permissions (permission_name, created_at, updated_at) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let permission = fetch_permission(&state.pool, id).await?;
    state.audit.created(auth.user_id, &permission);

    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    tag = "RBAC",
    params(Pagination),
    responses((status = 200, description = "List permissions", body = [Permission])),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<Permission>>> {
    let rows = sqlx::query_as::<_, Permission>(&format!(
        "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY permission_name LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission detail", body = Permission),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_permission(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Permission>> {
    Ok(Json(fetch_permission(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/permissions/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Permission id")),
    request_body = PermissionRequest,
    responses(
        (status = 200, description = "Permission renamed", body = Permission),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<PermissionRequest>,
) -> AppResult<Json<Permission>> {
    let name = validate_name(&payload.permission_name)?;
    let old = fetch_permission(&state.pool, id).await?;

    sqlx::query("UPDATE permissions SET permission_name = ?, updated_at = ? WHERE permission_id = ?")
        .bind(name)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let permission = fetch_permission(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &permission);

    Ok(Json(permission))
}

#[utoipa::path(
    delete,
    path = "/api/v1/permissions/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Permission id")),
    responses(
        (status = 204, description = "Permission deleted, grants removed with it"),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_permission(&state.pool, id).await?;

    sqlx::query("DELETE FROM permissions WHERE permission_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_permission(pool: &SqlitePool, id: i64) -> AppResult<Permission> {
    sqlx::query_as::<_, Permission>(&format!(
        "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE permission_id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("permission not found"))
}

#[cfg(test)]
mod tests {
    use super::validate_name;

    #[test]
    fn names_must_be_resource_action() {
        assert_eq!(validate_name(" Grade:View ").ok(), Some("Grade:View"));
        assert!(validate_name("grade").is_err());
        assert!(validate_name(":view").is_err());
        assert!(validate_name("grade:").is_err());
        assert!(validate_name("a:b:c").is_err());
    }
}
