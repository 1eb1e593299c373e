use axum::extract::State;
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::{QueryBuilder, Sqlite};

use crate::app::AppState;
use crate::authz::permissions;
use crate::errors::AppResult;
use crate::extract::ApiQuery;
use crate::models::audit_log::{AuditLog, AuditLogFilter};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/audit-logs",
        get(list_audit_logs.layer(state.require(permissions::AUDIT_LOG_LIST))),
    )
}

/// Newest first. Read-only: the trail is written by the background listener.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    tag = "Audit",
    params(AuditLogFilter),
    responses((status = 200, description = "Audit trail entries", body = [AuditLog])),
    security(("bearerAuth" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<AuditLogFilter>,
) -> AppResult<Json<Vec<AuditLog>>> {
    let page = filter.page();
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT audit_id, created_at, user_id, table_name, row_id, action_type, old_data, new_data, comment, \
         prev_hash, hash FROM audit_log WHERE 1 = 1",
    );

    if let Some(table) = filter.table_name.as_deref() {
        query.push(" AND table_name = ").push_bind(table.to_string());
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }

    query
        .push(" ORDER BY audit_id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let entries = query.build_query_as::<AuditLog>().fetch_all(&state.pool).await?;
    Ok(Json(entries))
}
