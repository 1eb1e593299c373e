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
use crate::models::curriculum::{Curriculum, CurriculumFilter, CurriculumRequest};
use crate::utils::{require_text, utc_now};

const CURRICULUM_COLUMNS: &str =
    "curriculum_id, subject_name, subject_description, semester_id, discipline_id, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/curriculums",
            get(list_curricula.layer(state.require(permissions::CURRICULUM_LIST)))
                .post(create_curriculum.layer(state.require(permissions::CURRICULUM_CREATE))),
        )
        .route(
            "/curriculums/:id",
            get(get_curriculum.layer(state.require(permissions::CURRICULUM_VIEW)))
                .put(update_curriculum.layer(state.require(permissions::CURRICULUM_UPDATE)))
                .delete(delete_curriculum.layer(state.require(permissions::CURRICULUM_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/curriculums",
    tag = "Curricula",
    request_body = CurriculumRequest,
    responses(
        (status = 201, description = "Curriculum entry created", body = Curriculum),
        (status = 400, description = "Unknown discipline or semester")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_curriculum(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CurriculumRequest>,
) -> AppResult<(StatusCode, Json<Curriculum>)> {
    require_text("subject_name", &payload.subject_name)?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO curricula (subject_name, subject_description, semester_id, discipline_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.subject_name.trim())
    .bind(&payload.subject_description)
    .bind(payload.semester_id)
    .bind(payload.discipline_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let curriculum = fetch_curriculum(&state.pool, id).await?;
    state.audit.created(auth.user_id, &curriculum);

    Ok((StatusCode::CREATED, Json(curriculum)))
}

#[utoipa::path(
    get,
    path = "/api/v1/curriculums",
    tag = "Curricula",
    params(CurriculumFilter),
    responses((status = 200, description = "Curriculum entries matching the filter", body = [Curriculum])),
    security(("bearerAuth" = []))
)]
pub async fn list_curricula(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CurriculumFilter>,
) -> AppResult<Json<Vec<Curriculum>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {CURRICULUM_COLUMNS} FROM curricula WHERE 1 = 1"));

    if let Some(semester_id) = filter.semester_id {
        query.push(" AND semester_id = ").push_bind(semester_id);
    }
    if let Some(discipline_id) = filter.discipline_id {
        query.push(" AND discipline_id = ").push_bind(discipline_id);
    }

    query
        .push(" ORDER BY curriculum_id LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let curricula = query.build_query_as::<Curriculum>().fetch_all(&state.pool).await?;
    Ok(Json(curricula))
}

#[utoipa::path(
    get,
    path = "/api/v1/curriculums/{id}",
    tag = "Curricula",
    params(("id" = i64, Path, description = "Curriculum id")),
    responses(
        (status = 200, description = "Curriculum entry", body = Curriculum),
        (status = 404, description = "Curriculum entry not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_curriculum(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Curriculum>> {
    Ok(Json(fetch_curriculum(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/curriculums/{id}",
    tag = "Curricula",
    params(("id" = i64, Path, description = "Curriculum id")),
    request_body = CurriculumRequest,
    responses(
        (status = 200, description = "Curriculum entry updated", body = Curriculum),
        (status = 404, description = "Curriculum entry not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_curriculum(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CurriculumRequest>,
) -> AppResult<Json<Curriculum>> {
    require_text("subject_name", &payload.subject_name)?;
    let old = fetch_curriculum(&state.pool, id).await?;

    sqlx::query(
        "UPDATE curricula SET subject_name = ?, subject_description = ?, semester_id = ?, discipline_id = ?, \
         updated_at = ? WHERE curriculum_id = ?",
    )
    .bind(payload.subject_name.trim())
    .bind(&payload.subject_description)
    .bind(payload.semester_id)
    .bind(payload.discipline_id)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let curriculum = fetch_curriculum(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &curriculum);

    Ok(Json(curriculum))
}

#[utoipa::path(
    delete,
    path = "/api/v1/curriculums/{id}",
    tag = "Curricula",
    params(("id" = i64, Path, description = "Curriculum id")),
    responses(
        (status = 204, description = "Curriculum entry deleted"),
        (status = 404, description = "Curriculum entry not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_curriculum(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_curriculum(&state.pool, id).await?;

    sqlx::query("DELETE FROM curricula WHERE curriculum_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_curriculum(pool: &SqlitePool, id: i64) -> AppResult<Curriculum> {
    sqlx::query_as::<_, Curriculum>(&format!("SELECT {CURRICULUM_COLUMNS} FROM curricula WHERE curriculum_id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("curriculum not found"))
}
