use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::models::pagination::Pagination;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AuditLog {
    pub audit_id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<i64>,
    pub table_name: String,
    pub row_id: i64,
    #[schema(example = "UPDATE")]
    pub action_type: String,
    pub old_data: Option<String>,
    pub new_data: Option<String>,
    pub comment: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogFilter {
    pub table_name: Option<String>,
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditLogFilter {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}
