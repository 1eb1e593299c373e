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
use crate::models::attendance::{Attendance, AttendanceFilter, AttendanceRequest};
use crate::utils::utc_now;

const ATTENDANCE_COLUMNS: &str = "attendance_id, student_id, discipline_id, visit, comment, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/attendances",
            get(list_attendances.layer(state.require(permissions::ATTENDANCE_LIST)))
                .post(create_attendance.layer(state.require(permissions::ATTENDANCE_CREATE))),
        )
        .route(
            "/attendances/:id",
            get(get_attendance.layer(state.require(permissions::ATTENDANCE_VIEW)))
                .put(update_attendance.layer(state.require(permissions::ATTENDANCE_UPDATE)))
                .delete(delete_attendance.layer(state.require(permissions::ATTENDANCE_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/attendances",
    tag = "Attendance",
    request_body = AttendanceRequest,
    responses(
        (status = 201, description = "Attendance recorded", body = Attendance),
        (status = 400, description = "Unknown student or discipline")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<AttendanceRequest>,
) -> AppResult<(StatusCode, Json<Attendance>)> {
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO attendances (student_id, discipline_id, visit, comment, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.student_id)
    .bind(payload.discipline_id)
    .bind(payload.visit)
    .bind(&payload.comment)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let attendance = fetch_attendance(&state.pool, id).await?;
    state.audit.created(auth.user_id, &attendance);

    Ok((StatusCode::CREATED, Json(attendance)))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendances",
    tag = "Attendance",
    params(AttendanceFilter),
    responses((status = 200, description = "Attendance matching the filter", body = [Attendance])),
    security(("bearerAuth" = []))
)]
pub async fn list_attendances(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<AttendanceFilter>,
) -> AppResult<Json<Vec<Attendance>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE 1 = 1"));

    if let Some(student_id) = filter.student_id {
        query.push(" AND student_id = ").push_bind(student_id);
    }
    if let Some(discipline_id) = filter.discipline_id {
        query.push(" AND discipline_id = ").push_bind(discipline_id);
    }
    if let Some(date) = filter.date {
        query.push(" AND substr(created_at, 1, 10) = ").push_bind(date);
    }

    query
        .push(" ORDER BY created_at DESC, attendance_id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows = query.build_query_as::<Attendance>().fetch_all(&state.pool).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendances/{id}",
    tag = "Attendance",
    params(("id" = i64, Path, description = "Attendance id")),
    responses(
        (status = 200, description = "Attendance record", body = Attendance),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_attendance(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Attendance>> {
    Ok(Json(fetch_attendance(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/attendances/{id}",
    tag = "Attendance",
    params(("id" = i64, Path, description = "Attendance id")),
    request_body = AttendanceRequest,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<AttendanceRequest>,
) -> AppResult<Json<Attendance>> {
    let old = fetch_attendance(&state.pool, id).await?;

    sqlx::query(
        "UPDATE attendances SET student_id = ?, discipline_id = ?, visit = ?, comment = ?, updated_at = ? \
         WHERE attendance_id = ?",
    )
    .bind(payload.student_id)
    .bind(payload.discipline_id)
    .bind(payload.visit)
    .bind(&payload.comment)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let attendance = fetch_attendance(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &attendance);

    Ok(Json(attendance))
}

#[utoipa::path(
    delete,
    path = "/api/v1/attendances/{id}",
    tag = "Attendance",
    params(("id" = i64, Path, description = "Attendance id")),
    responses(
        (status = 204, description = "Attendance deleted"),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_attendance(&state.pool, id).await?;

    sqlx::query("DELETE FROM attendances WHERE attendance_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_attendance(pool: &SqlitePool, id: i64) -> AppResult<Attendance> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE attendance_id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("attendance not found"))
}
