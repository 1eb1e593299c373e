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
use crate::models::discipline::{Discipline, DisciplineFilter, DisciplinePublic, DisciplineRequest};
use crate::utils::{require_text, utc_now};

const DISCIPLINE_COLUMNS: &str =
    "discipline_id, discipline_name, teacher_id, student_group_id, created_at, updated_at";

const PUBLIC_SELECT: &str = "SELECT d.discipline_id, d.discipline_name, \
     d.teacher_id, t.first_name AS teacher_first_name, t.last_name AS teacher_last_name, \
     t.middle_name AS teacher_middle_name, \
     d.student_group_id, g.student_group_name, \
     g.curator_id, c.first_name AS curator_first_name, c.last_name AS curator_last_name, \
     c.middle_name AS curator_middle_name, \
     g.academic_year_id, d.created_at, d.updated_at \
     FROM disciplines d \
     JOIN users t ON t.user_id = d.teacher_id \
     JOIN student_groups g ON g.student_group_id = d.student_group_id \
     JOIN users c ON c.user_id = g.curator_id";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/disciplines",
            get(list_disciplines.layer(state.require(permissions::DISCIPLINE_LIST)))
                .post(create_discipline.layer(state.require(permissions::DISCIPLINE_CREATE))),
        )
        .route(
            "/disciplines/public",
            get(list_public_disciplines.layer(state.require(permissions::DISCIPLINE_LIST_PUBLIC))),
        )
        .route(
            "/disciplines/public/:id",
            get(get_public_discipline.layer(state.require(permissions::DISCIPLINE_VIEW_PUBLIC))),
        )
        .route(
            "/disciplines/:id",
            get(get_discipline.layer(state.require(permissions::DISCIPLINE_VIEW)))
                .put(update_discipline.layer(state.require(permissions::DISCIPLINE_UPDATE)))
                .delete(delete_discipline.layer(state.require(permissions::DISCIPLINE_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/disciplines",
    tag = "Disciplines",
    request_body = DisciplineRequest,
    responses(
        (status = 201, description = "Discipline created", body = Discipline),
        (status = 400, description = "Unknown teacher or group")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_discipline(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<DisciplineRequest>,
) -> AppResult<(StatusCode, Json<Discipline>)> {
    require_text("discipline_name", &payload.discipline_name)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO disciplines (discipline_name, teacher_id, student_group_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.discipline_name.trim())
    .bind(payload.teacher_id)
    .bind(payload.student_group_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let discipline = fetch_discipline(&state.pool, id).await?;
    state.audit.created(auth.user_id, &discipline);

    Ok((StatusCode::CREATED, Json(discipline)))
}

#[utoipa::path(
    get,
    path = "/api/v1/disciplines",
    tag = "Disciplines",
    params(DisciplineFilter),
    responses((status = 200, description = "Disciplines matching the filter", body = [Discipline])),
    security(("bearerAuth" = []))
)]
pub async fn list_disciplines(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<DisciplineFilter>,
) -> AppResult<Json<Vec<Discipline>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT d.discipline_id, d.discipline_name, d.teacher_id, d.student_group_id, d.created_at, d.updated_at \
         FROM disciplines d JOIN student_groups g ON g.student_group_id = d.student_group_id",
    );
    push_filter(&mut query, &filter);
    query
        .push(" ORDER BY d.discipline_id LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let disciplines = query.build_query_as::<Discipline>().fetch_all(&state.pool).await?;
    Ok(Json(disciplines))
}

#[utoipa::path(
    get,
    path = "/api/v1/disciplines/{id}",
    tag = "Disciplines",
    params(("id" = i64, Path, description = "Discipline id")),
    responses(
        (status = 200, description = "Discipline", body = Discipline),
        (status = 404, description = "Discipline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_discipline(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Discipline>> {
    Ok(Json(fetch_discipline(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/disciplines/{id}",
    tag = "Disciplines",
    params(("id" = i64, Path, description = "Discipline id")),
    request_body = DisciplineRequest,
    responses(
        (status = 200, description = "Discipline updated", body = Discipline),
        (status = 404, description = "Discipline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_discipline(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<DisciplineRequest>,
) -> AppResult<Json<Discipline>> {
    require_text("discipline_name", &payload.discipline_name)?;
    let old = fetch_discipline(&state.pool, id).await?;

    sqlx::query(
        "UPDATE disciplines SET discipline_name = ?, teacher_id = ?, student_group_id = ?, updated_at = ? \
         WHERE discipline_id = ?",
    )
    .bind(payload.discipline_name.trim())
    .bind(payload.teacher_id)
    .bind(payload.student_group_id)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let discipline = fetch_discipline(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &discipline);

    Ok(Json(discipline))
}

#[utoipa::path(
    delete,
    path = "/api/v1/disciplines/{id}",
    tag = "Disciplines",
    params(("id" = i64, Path, description = "Discipline id")),
    responses(
        (status = 204, description = "Discipline deleted with its grades, attendance and curricula"),
        (status = 404, description = "Discipline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_discipline(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_discipline(&state.pool, id).await?;

    sqlx::query("DELETE FROM disciplines WHERE discipline_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/disciplines/public",
    tag = "Disciplines",
    params(DisciplineFilter),
    responses((status = 200, description = "Disciplines with teacher and curator names", body = [DisciplinePublic])),
    security(("bearerAuth" = []))
)]
pub async fn list_public_disciplines(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<DisciplineFilter>,
) -> AppResult<Json<Vec<DisciplinePublic>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(PUBLIC_SELECT);
    push_filter(&mut query, &filter);
    query
        .push(" ORDER BY d.discipline_name LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let disciplines = query.build_query_as::<DisciplinePublic>().fetch_all(&state.pool).await?;
    Ok(Json(disciplines))
}

#[utoipa::path(
    get,
    path = "/api/v1/disciplines/public/{id}",
    tag = "Disciplines",
    params(("id" = i64, Path, description = "Discipline id")),
    responses(
        (status = 200, description = "Discipline with teacher and curator names", body = DisciplinePublic),
        (status = 404, description = "Discipline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_public_discipline(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<DisciplinePublic>> {
    let discipline = sqlx::query_as::<_, DisciplinePublic>(&format!("{PUBLIC_SELECT} WHERE d.discipline_id = ?"))
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("discipline not found"))?;

    Ok(Json(discipline))
}

/// Appends the WHERE clause; expects `disciplines d` joined with `student_groups g`.
fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &DisciplineFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(teacher_id) = filter.teacher_id {
        query.push(" AND d.teacher_id = ").push_bind(teacher_id);
    }
    if let Some(group_id) = filter.student_group_id {
        query.push(" AND d.student_group_id = ").push_bind(group_id);
    }
    if let Some(year_id) = filter.academic_year_id {
        query.push(" AND g.academic_year_id = ").push_bind(year_id);
    }
}

async fn fetch_discipline(pool: &SqlitePool, id: i64) -> AppResult<Discipline> {
    sqlx::query_as::<_, Discipline>(&format!(
        "SELECT {DISCIPLINE_COLUMNS} FROM disciplines WHERE discipline_id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("discipline not found"))
}
