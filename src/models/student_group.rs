use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::audit::Auditable;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StudentGroup {
    pub student_group_id: i64,
    pub student_group_name: String,
    pub curator_id: i64,
    pub academic_year_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for StudentGroup {
    fn table_name() -> &'static str {
        "student_groups"
    }

    fn row_id(&self) -> i64 {
        self.student_group_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentGroupRequest {
    #[schema(example = "CS-101")]
    pub student_group_name: String,
    pub curator_id: i64,
    pub academic_year_id: i64,
}

/// Group with its curator's name resolved.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct StudentGroupPublic {
    pub student_group_id: i64,
    pub student_group_name: String,
    pub curator_id: i64,
    pub curator_first_name: String,
    pub curator_last_name: String,
    pub curator_middle_name: Option<String>,
    pub academic_year_id: i64,
}
