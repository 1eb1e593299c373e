use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::audit::Auditable;
use crate::models::pagination::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Semester {
    pub semester_id: i64,
    pub start_with: NaiveDate,
    pub ends_with: NaiveDate,
    pub academic_year_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Semester {
    fn table_name() -> &'static str {
        "semesters"
    }

    fn row_id(&self) -> i64 {
        self.semester_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SemesterRequest {
    pub start_with: NaiveDate,
    pub ends_with: NaiveDate,
    pub academic_year_id: i64,
}

/// `from_date` keeps semesters starting on or after it, `to_date` those
/// ending on or before it.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SemesterFilter {
    pub academic_year_id: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SemesterFilter {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}
