use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::audit::Auditable;
use crate::models::pagination::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Curriculum {
    pub curriculum_id: i64,
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub semester_id: Option<i64>,
    pub discipline_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Curriculum {
    fn table_name() -> &'static str {
        "curricula"
    }

    fn row_id(&self) -> i64 {
        self.curriculum_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CurriculumRequest {
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub semester_id: Option<i64>,
    pub discipline_id: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CurriculumFilter {
    pub semester_id: Option<i64>,
    pub discipline_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CurriculumFilter {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}
