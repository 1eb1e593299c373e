use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::audit::Auditable;
use crate::errors::AppError;
use crate::models::pagination::Pagination;

pub const MIN_GRADE: i16 = 1;
pub const MAX_GRADE: i16 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct GradeJournal {
    pub grade_journal_id: i64,
    pub student_id: i64,
    pub discipline_id: i64,
    pub grade: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for GradeJournal {
    fn table_name() -> &'static str {
        "grade_journals"
    }

    fn row_id(&self) -> i64 {
        self.grade_journal_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GradeJournalRequest {
    pub student_id: i64,
    pub discipline_id: i64,
    #[schema(example = 5)]
    pub grade: i16,
    pub comment: Option<String>,
}

impl GradeJournalRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(MIN_GRADE..=MAX_GRADE).contains(&self.grade) {
            return Err(AppError::bad_request(format!(
                "grade must be between {MIN_GRADE} and {MAX_GRADE}"
            )));
        }
        Ok(())
    }
}

/// Grade row with the student's and discipline's names resolved.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct GradeJournalPublic {
    pub grade_journal_id: i64,
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub discipline_id: i64,
    pub discipline_name: String,
    pub grade: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Date bounds are inclusive and compare against the day the grade was
/// recorded.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GradeFilter {
    pub student_id: Option<i64>,
    pub discipline_id: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl GradeFilter {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AverageGrade {
    /// 0 when no grade matches.
    pub average: f64,
    pub count: i64,
}
