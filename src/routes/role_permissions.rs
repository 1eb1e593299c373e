use axum::extract::State;
use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::permissions;
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath};
use crate::jwt::AuthUser;
use crate::models::rbac::{Permission, RolePermission, RolePermissionRequest};
use crate::utils::utc_now;

const ROLE_PERMISSION_COLUMNS: &str = "role_id, permission_id, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/role-permissions/assign",
            post(assign_permission.layer(state.require(permissions::ROLE_PERMISSION_ASSIGN))),
        )
        .route(
            "/role-permissions/remove",
            post(remove_permission.layer(state.require(permissions::ROLE_PERMISSION_REMOVE))),
        )
        .route(
            "/role-permissions/:id",
            get(list_role_permissions.layer(state.require(permissions::ROLE_PERMISSION_VIEW))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/role-permissions/assign",
    tag = "RBAC",
    request_body = RolePermissionRequest,
    responses(
        (status = 201, description = "Permission granted to role", body = RolePermission),
        (status = 400, description = "Unknown role or permission"),
        (status = 409, description = "Role already has the permission")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<RolePermissionRequest>,
) -> AppResult<(StatusCode, Json<RolePermission>)> {
    let now = utc_now();

    sqlx::query("INSERT INTO role_permissions (role_id, permission_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(payload.role_id)
        .bind(payload.permission_id)
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let link = RolePermission {
        role_id: payload.role_id,
        permission_id: payload.permission_id,
        created_at: now,
        updated_at: now,
    };

    tracing::info!(role_id = link.role_id, permission_id = link.permission_id, by = auth.user_id, "permission granted");
    state.audit.assigned(auth.user_id, &link);

    Ok((StatusCode::CREATED, Json(link)))
}

#[utoipa::path(
    post,
    path = "/api/v1/role-permissions/remove",
    tag = "RBAC",
    request_body = RolePermissionRequest,
    responses(
        (status = 204, description = "Permission revoked from role"),
        (status = 404, description = "Role does not have the permission")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<RolePermissionRequest>,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;

    let link = sqlx::query_as::<_, RolePermission>(&format!(
        "SELECT {ROLE_PERMISSION_COLUMNS} FROM role_permissions WHERE role_id = ? AND permission_id = ?"
    ))
    .bind(payload.role_id)
    .bind(payload.permission_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("permission grant not found"))?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
        .bind(link.role_id)
        .bind(link.permission_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(role_id = link.role_id, permission_id = link.permission_id, by = auth.user_id, "permission revoked");
    state.audit.removed(auth.user_id, &link);

    Ok(StatusCode::NO_CONTENT)
}

/// Permissions granted to a role, with their names as stored.
#[utoipa::path(
    get,
    path = "/api/v1/role-permissions/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "Role id")),
    responses((status = 200, description = "Permissions granted to the role", body = [Permission])),
    security(("bearerAuth" = []))
)]
pub async fn list_role_permissions(
    State(state): State<AppState>,
    ApiPath(role_id): ApiPath<i64>,
) -> AppResult<Json<Vec<Permission>>> {
    let granted = sqlx::query_as::<_, Permission>(
        "SELECT p.permission_id, p.permission_name, p.created_at, p.updated_at \
         FROM role_permissions rp \
         JOIN permissions p ON p.permission_id = rp.permission_id \
         WHERE rp.role_id = ? ORDER BY p.permission_id",
    )
    .bind(role_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(granted))
}
