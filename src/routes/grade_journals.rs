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
use crate::models::grade_journal::{AverageGrade, GradeFilter, GradeJournal, GradeJournalPublic, GradeJournalRequest};
use crate::utils::utc_now;

const GRADE_COLUMNS: &str = "grade_journal_id, student_id, discipline_id, grade, comment, created_at, updated_at";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/gradejournals",
            get(list_grades.layer(state.require(permissions::GRADE_JOURNAL_LIST)))
                .post(create_grade.layer(state.require(permissions::GRADE_JOURNAL_CREATE))),
        )
        .route(
            "/gradejournals/public",
            get(list_public_grades.layer(state.require(permissions::GRADE_JOURNAL_LIST_PUBLIC))),
        )
        .route(
            "/gradejournals/average",
            get(average_grade.layer(state.require(permissions::GRADE_JOURNAL_AVG))),
        )
        .route(
            "/gradejournals/:id",
            get(get_grade.layer(state.require(permissions::GRADE_JOURNAL_VIEW)))
                .put(update_grade.layer(state.require(permissions::GRADE_JOURNAL_UPDATE)))
                .delete(delete_grade.layer(state.require(permissions::GRADE_JOURNAL_DELETE))),
        )
}

#[utoipa::path(
    post,
    path = "/api/v1/gradejournals",
    tag = "Grades",
    request_body = GradeJournalRequest,
    responses(
        (status = 201, description = "Grade recorded", body = GradeJournal),
        (status = 400, description = "Grade out of range or unknown student/discipline")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_grade(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<GradeJournalRequest>,
) -> AppResult<(StatusCode, Json<GradeJournal>)> {
    payload.validate()?;
    let now = utc_now();

    let id = sqlx::query(
        "INSERT INTO grade_journals (student_id, discipline_id, grade, comment, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.student_id)
    .bind(payload.discipline_id)
    .bind(payload.grade)
    .bind(&payload.comment)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    let grade = fetch_grade(&state.pool, id).await?;
    state.audit.created(auth.user_id, &grade);

    Ok((StatusCode::CREATED, Json(grade)))
}

#[utoipa::path(
    get,
    path = "/api/v1/gradejournals",
    tag = "Grades",
    params(GradeFilter),
    responses((status = 200, description = "Grades matching the filter", body = [GradeJournal])),
    security(("bearerAuth" = []))
)]
pub async fn list_grades(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<GradeFilter>,
) -> AppResult<Json<Vec<GradeJournal>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT gj.grade_journal_id, gj.student_id, gj.discipline_id, gj.grade, gj.comment, gj.created_at, gj.updated_at \
         FROM grade_journals gj",
    );
    push_filter(&mut query, &filter);
    query
        .push(" ORDER BY gj.created_at DESC, gj.grade_journal_id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let grades = query.build_query_as::<GradeJournal>().fetch_all(&state.pool).await?;
    Ok(Json(grades))
}

#[utoipa::path(
    get,
    path = "/api/v1/gradejournals/public",
    tag = "Grades",
    params(GradeFilter),
    responses((status = 200, description = "Grades with student and discipline names", body = [GradeJournalPublic])),
    security(("bearerAuth" = []))
)]
pub async fn list_public_grades(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<GradeFilter>,
) -> AppResult<Json<Vec<GradeJournalPublic>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT gj.grade_journal_id, gj.student_id, u.first_name, u.last_name, \
         gj.discipline_id, d.discipline_name, gj.grade, gj.comment, gj.created_at, gj.updated_at \
         FROM grade_journals gj \
         JOIN users u ON u.user_id = gj.student_id \
         JOIN disciplines d ON d.discipline_id = gj.discipline_id",
    );
    push_filter(&mut query, &filter);
    query
        .push(" ORDER BY gj.created_at DESC, gj.grade_journal_id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let grades = query.build_query_as::<GradeJournalPublic>().fetch_all(&state.pool).await?;
    Ok(Json(grades))
}

/// Mean grade over the filtered rows; paging parameters are ignored.
#[utoipa::path(
    get,
    path = "/api/v1/gradejournals/average",
    tag = "Grades",
    params(GradeFilter),
    responses((status = 200, description = "Average grade", body = AverageGrade)),
    security(("bearerAuth" = []))
)]
pub async fn average_grade(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<GradeFilter>,
) -> AppResult<Json<AverageGrade>> {
    let mut query = QueryBuilder::<Sqlite>::new("SELECT AVG(gj.grade), COUNT(gj.grade) FROM grade_journals gj");
    push_filter(&mut query, &filter);

    let (average, count): (Option<f64>, i64) = query.build_query_as().fetch_one(&state.pool).await?;

    Ok(Json(AverageGrade {
        average: average.unwrap_or(0.0),
        count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/gradejournals/{id}",
    tag = "Grades",
    params(("id" = i64, Path, description = "Grade journal id")),
    responses(
        (status = 200, description = "Grade", body = GradeJournal),
        (status = 404, description = "Grade not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_grade(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<GradeJournal>> {
    Ok(Json(fetch_grade(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/gradejournals/{id}",
    tag = "Grades",
    params(("id" = i64, Path, description = "Grade journal id")),
    request_body = GradeJournalRequest,
    responses(
        (status = 200, description = "Grade updated", body = GradeJournal),
        (status = 400, description = "Grade out of range"),
        (status = 404, description = "Grade not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_grade(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<GradeJournalRequest>,
) -> AppResult<Json<GradeJournal>> {
    payload.validate()?;
    let old = fetch_grade(&state.pool, id).await?;

    sqlx::query(
        "UPDATE grade_journals SET student_id = ?, discipline_id = ?, grade = ?, comment = ?, updated_at = ? \
         WHERE grade_journal_id = ?",
    )
    .bind(payload.student_id)
    .bind(payload.discipline_id)
    .bind(payload.grade)
    .bind(&payload.comment)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let grade = fetch_grade(&state.pool, id).await?;
    state.audit.updated(auth.user_id, &old, &grade);

    Ok(Json(grade))
}

#[utoipa::path(
    delete,
    path = "/api/v1/gradejournals/{id}",
    tag = "Grades",
    params(("id" = i64, Path, description = "Grade journal id")),
    responses(
        (status = 204, description = "Grade deleted"),
        (status = 404, description = "Grade not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_grade(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let existing = fetch_grade(&state.pool, id).await?;

    sqlx::query("DELETE FROM grade_journals WHERE grade_journal_id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.audit.deleted(auth.user_id, &existing);
    Ok(StatusCode::NO_CONTENT)
}

/// Dates compare against the UTC day part of `created_at`.
fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &GradeFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(student_id) = filter.student_id {
        query.push(" AND gj.student_id = ").push_bind(student_id);
    }
    if let Some(discipline_id) = filter.discipline_id {
        query.push(" AND gj.discipline_id = ").push_bind(discipline_id);
    }
    if let Some(from) = filter.from_date {
        query.push(" AND substr(gj.created_at, 1, 10) >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        query.push(" AND substr(gj.created_at, 1, 10) <= ").push_bind(to);
    }
}

async fn fetch_grade(pool: &SqlitePool, id: i64) -> AppResult<GradeJournal> {
    sqlx::query_as::<_, GradeJournal>(&format!(
        "SELECT {GRADE_COLUMNS} FROM grade_journals WHERE grade_journal_id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("grade not found"))
}
