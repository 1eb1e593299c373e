use axum::extract::State;
use axum::handler::Handler;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app::AppState;
use crate::authz::permissions;
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::jwt::AuthUser;
use crate::models::academic_year::ensure_ordered;
use crate::models::semester::{Semester, SemesterFilter, SemesterRequest};
use crate::utils::utc_now;

const SEMESTER_COLUMNS: &str = "semester_id, start_with, ends_with, academic_year_id, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/semesters",
            get(list_semesters.layer(state.require(permissions::SEMESTER_LIST)))
                .post(create_semester.layer(state.require(permissions::SEMESTER_CREATE))),
        )
        .route(
            "/semesters/:id",
            get(get_semester.layer(state.require(permissions::SEMESTER_VIEW)))
                .put(update_semester.layer(state.require(permissions::SEMESTER_UPDATE)))
                .delete(delete_semester.layer(state.require(permissions::SEMESTER_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/semesters",
    tag = "Calendar",
    request_body = SemesterRequest,
    responses(
        (status = 201, description = "Semester created", body = Semester),
        (status = 400, description = "Bad dates or unknown academic year")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_semester(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<SemesterRequest>,
) -> AppResult<(StatusCode, Json<Semester>)> {
    ensure_ordered(payload.start_with, payload.ends_with)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO semesters (start_with, ends_with, academic_year_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.start_with)
    .bind(payload.ends_with)
    .bind(payload.academic_year_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let semester = fetch_semester(&state.pool, id).await?;
    state.audit.created(auth.user_id, &semester);

    Ok((StatusCode::CREATED, Json(semester)))
}

#[utoipa::path(
    get,
    path = "/api/v1/semesters",
    tag = "Calendar",
    params(SemesterFilter),
    responses((status = 200, description = "Semesters matching the filter", body = [Semester])),
    security(("bearerAuth" = []))
)]
pub async fn list_semesters(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SemesterFilter>,
) -> AppResult<Json<Vec<Semester>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {SEMESTER_COLUMNS} FROM semesters WHERE 1 = 1"));

    if let Some(year) = filter.academic_year_id {
        query.push(" AND academic_year_id = ").push_bind(year);
    }
    if let Some(from) = filter.from_date {
        query.push(" AND start_with >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        query.push(" AND ends_with <= ").push_bind(to);
    }

    query
        .push(" ORDER BY start_with LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let semesters = query.build_query_as::<Semester>().fetch_all(&state.pool).await?;
    Ok(Json(semesters))
}

#[utoipa::path(
    get,
    path = "/api/v1/semesters/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "Semester id")),
    responses(
        (status = 200, description = "Semester", body = Semester),
        (status = 404, description = "Semester not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_semester(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Semester>> {
    Ok(Json(fetch_semester(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/semesters/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "Semester id")),
    request_body = SemesterRequest,
    responses(
        (status = 200, description = "Semester updated", body = Semester),
        (status = 404, description = "Semester not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_semester(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<SemesterRequest>,
) -> AppResult<Json<Semester>> {
    ensure_ordered(payload.start_with, payload.ends_with)?;
    let old = fetch_semester(&state.pool, id).await?;

    sqlx::query(
        "UPDATE semesters SET start_with = ?, ends_with = ?, academic_year_id = ?, updated_at = ? WHERE semester_id = ?",
    )
    .bind(payload.start_with)
    .bind(payload.ends_with)
    .bind(payload.academic_year_id)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let semester = fetch_semester(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &semester);

    Ok(Json(semester))
}

#[utoipa::path(
    delete,
    path = "/api/v1/semesters/{id}",
    tag = "Calendar",
    params(("id" = i64, Path, description = "Semester id")),
    responses(
        (status = 204, description = "Semester deleted"),
        (status = 404, description = "Semester not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_semester(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_semester(&state.pool, id).await?;

    sqlx::query("DELETE FROM semesters WHERE semester_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_semester(pool: &SqlitePool, id: i64) -> AppResult<Semester> {
    sqlx::query_as::<_, Semester>(&format!("SELECT {SEMESTER_COLUMNS} FROM semesters WHERE semester_id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("semester not found"))
}
