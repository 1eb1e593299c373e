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
use crate::models::rbac::{UserRole, UserRoleRequest};
use crate::utils::utc_now;

const USER_ROLE_COLUMNS: &str = "user_id, role_id, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/user-roles/assign",
            post(assign_role.layer(state.require(permissions::USER_ROLE_ASSIGN))),
        )
        .route(
            "/user-roles/remove",
            post(remove_role.layer(state.require(permissions::USER_ROLE_REMOVE))),
        )
        .route(
            "/user-roles/:id",
            get(list_user_roles.layer(state.require(permissions::USER_ROLE_VIEW))),
        )
}

/// Grants a role to a user. Takes effect on that user's next request.
#[utoipa::path(
    post,
    path = "/api/v1/user-roles/assign",
    tag = "RBAC",
    request_body = UserRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = UserRole),
        (status = 400, description = "Unknown user or role"),
        (status = 409, description = "User already has the role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UserRoleRequest>,
) -> AppResult<(StatusCode, Json<UserRole>)> {
    let now = utc_now();

    sqlx::query("INSERT INTO user_roles (user_id, role_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(payload.user_id)
        .bind(payload.role_id)
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let link = UserRole {
        user_id: payload.user_id,
        role_id: payload.role_id,
        created_at: now,
        updated_at: now,
    };

    tracing::info!(user_id = link.user_id, role_id = link.role_id, by = auth.user_id, "role assigned");
    state.audit.assigned(auth.user_id, &link);

    Ok((StatusCode::CREATED, Json(link)))
}

/// Revokes a role. The user's very next request is evaluated without it.
#[utoipa::path(
    post,
    path = "/api/v1/user-roles/remove",
    tag = "RBAC",
    request_body = UserRoleRequest,
    responses(
        (status = 204, description = "Role removed"),
        (status = 404, description = "User does not have the role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_role(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UserRoleRequest>,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;

    let link = sqlx::query_as::<_, UserRole>(&format!(
        "SELECT {USER_ROLE_COLUMNS} FROM user_roles WHERE user_id = ? AND role_id = ?"
    ))
    .bind(payload.user_id)
    .bind(payload.role_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("role assignment not found"))?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
        .bind(link.user_id)
        .bind(link.role_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = link.user_id, role_id = link.role_id, by = auth.user_id, "role removed");
    state.audit.removed(auth.user_id, &link);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/user-roles/{id}",
    tag = "RBAC",
    params(("id" = i64, Path, description = "User id")),
    responses((status = 200, description = "Roles assigned to the user", body = [UserRole])),
    security(("bearerAuth" = []))
)]
pub async fn list_user_roles(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> AppResult<Json<Vec<UserRole>>> {
    let links = sqlx::query_as::<_, UserRole>(&format!(
        "SELECT {USER_ROLE_COLUMNS} FROM user_roles WHERE user_id = ? ORDER BY role_id"
    ))
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(links))
}
