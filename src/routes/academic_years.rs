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
use crate::models::academic_year::{ensure_ordered, AcademicYear, AcademicYearRequest};
use crate::models::pagination::Pagination;
use crate::utils::utc_now;

const YEAR_COLUMNS: &str = "academic_year_id, start_with, ends_with, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/academic-years",
            get(list_years.layer(state.require(permissions::ACADEMIC_YEAR_LIST)))
                .post(create_year.layer(state.require(permissions::ACADEMIC_YEAR_CREATE))),
        )
        .route(
            "/academic-years/:id",
            get(get_year.layer(state.require(permissions::ACADEMIC_YEAR_VIEW)))
                .put(update_year.layer(state.require(permissions::ACADEMIC_YEAR_UPDATE)))
                .delete(delete_year.layer(state.require(permissions::ACADEMIC_YEAR_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/academic-years",
    tag = "Calendar",
    request_body = AcademicYearRequest,
    responses(
        (status = 201, description = "Academic year created", body = AcademicYear),
        (status = 400, description = "ends_with before start_with")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_year(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<AcademicYearRequest>,
) -> AppResult<(StatusCode, Json<AcademicYear>)> {
    ensure_ordered(payload.start_with, payload.ends_with)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO academic_years (start_with, ends_with, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.start_with)
    .bind(payload.ends_with)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let year = fetch_year(&state.pool, id).await?;
    state.audit.created(auth.user_id, &year);

    Ok((StatusCode::CREATED, Json(year)))
}

#[utoipa::path(
    get,
    path = "/api/v1/academic-years",
    tag = "Calendar",
    params(Pagination),
    responses((status = 200, description = "Academic years, most recent first", body = [AcademicYear])),
    security(("bearerAuth" = []))
)]
pub async fn list_years(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> AppResult<Json<Vec<AcademicYear>>> {
    let years = sqlx::query_as::<_, AcademicYear>(&format!(
        "SELECT {YEAR_COLUMNS} FROM academic_years ORDER BY start_with DESC LIMIT ? OFFSET ?"
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(years))
}

#[utoipa::path(
    get,
    path = "/api/v1/academic-years/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "Academic year id")),
    responses(
        (status = 200, description = "Academic year", body = AcademicYear),
        (status = 404, description = "Academic year not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_year(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<AcademicYear>> {
    Ok(Json(fetch_year(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/academic-years/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "Academic year id")),
    request_body = AcademicYearRequest,
    responses(
        (status = 200, description = "Academic year updated", body = AcademicYear),
        (status = 404, description = "Academic year not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_year(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<AcademicYearRequest>,
) -> AppResult<Json<AcademicYear>> {
    ensure_ordered(payload.start_with, payload.ends_with)?;
    let old = fetch_year(&state.pool, id).await?;

    sqlx::query("UPDATE academic_years SET start_with = ?, ends_with = ?, updated_at = ? WHERE academic_year_id = ?")
        .bind(payload.start_with)
        .bind(payload.ends_with)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let year = fetch_year(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &year);

    Ok(Json(year))
}

#[utoipa::path(
    delete,
    path = "/api/v1/academic-years/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "Academic year id")),
    responses(
        (status = 204, description = "Academic year deleted with its semesters"),
        (status = 400, description = "Year still referenced by a student group"),
        (status = 404, description = "Academic year not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_year(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_year(&state.pool, id).await?;

    sqlx::query("DELETE FROM academic_years WHERE academic_year_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_year(pool: &SqlitePool, id: i64) -> AppResult<AcademicYear> {
    sqlx::query_as::<_, AcademicYear>(&format!(
        "SELECT {YEAR_COLUMNS} FROM academic_years WHERE academic_year_id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("academic year not found"))
}
