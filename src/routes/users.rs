use axum::extract::State;
use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::permissions;
use crate::errors::AppResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::jwt::AuthUser;
use crate::models::pagination::Pagination;
use crate::models::user::{DbUser, User, UserUpdateRequest, USER_COLUMNS};
use crate::routes::auth::fetch_user_by_id;
use crate::utils::{hash_password, normalize_email, require_text, utc_now};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users.layer(state.require(permissions::USER_LIST))))
        .route(
            "/users/:id",
            get(get_user.layer(state.require(permissions::USER_VIEW)))
                .put(update_user.layer(state.require(permissions::USER_UPDATE)))
                .delete(delete_user.layer(state.require(permissions::USER_DELETE))),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    params(Pagination),
    responses(
        (status = 200, description = "List users", body = [User]),
        (status = 403, description = "Missing user:list")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<User>>> {
    let users = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY user_id LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(users.into_iter().map(User::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<User>> {
    let user = fetch_user_by_id(&state.pool, id).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    let existing = fetch_user_by_id(&state.pool, id).await?;

    let email = normalize_email(&payload.email)?;
    require_text("first_name", &payload.first_name)?;
    require_text("last_name", &payload.last_name)?;
    let password_hash = match payload.password.as_deref() {
        Some(password) => hash_password(password)?,
        None => existing.password_hash.clone(),
    };

    sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, middle_name = ?, email = ?, password_hash = ?, updated_at = ? \
         WHERE user_id = ?",
    )
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&payload.middle_name)
    .bind(&email)
    .bind(password_hash)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let old: User = existing.into();
    let user: User = fetch_user_by_id(&state.pool, id).await?.into();
    state.audit.updated(auth.user_id, &old, &user);

    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing: User = fetch_user_by_id(&state.pool, id).await?.into();

    sqlx::query("DELETE FROM users WHERE user_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}
