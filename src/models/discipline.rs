use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::audit::Auditable;
use crate::models::pagination::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Discipline {
    pub discipline_id: i64,
    pub discipline_name: String,
    pub teacher_id: i64,
    pub student_group_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Discipline {
    fn table_name() -> &'static str {
        "disciplines"
    }

    fn row_id(&self) -> i64 {
        self.discipline_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DisciplineRequest {
    #[schema(example = "Linear Algebra")]
    pub discipline_name: String,
    pub teacher_id: i64,
    pub student_group_id: i64,
}

/// Discipline joined with its teacher, group and the group's curator.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DisciplinePublic {
    pub discipline_id: i64,
    pub discipline_name: String,
    pub teacher_id: i64,
    pub teacher_first_name: String,
    pub teacher_last_name: String,
    pub teacher_middle_name: Option<String>,
    pub student_group_id: i64,
    pub student_group_name: String,
    pub curator_id: i64,
    pub curator_first_name: String,
    pub curator_last_name: String,
    pub curator_middle_name: Option<String>,
    pub academic_year_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DisciplineFilter {
    pub teacher_id: Option<i64>,
    pub student_group_id: Option<i64>,
    pub academic_year_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DisciplineFilter {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}
