use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::audit::Auditable;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AcademicYear {
    pub academic_year_id: i64,
    pub start_with: NaiveDate,
    pub ends_with: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for AcademicYear {
    fn table_name() -> &'static str {
        "academic_years"
    }

    fn row_id(&self) -> i64 {
        self.academic_year_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcademicYearRequest {
    #[schema(example = "2024-09-01")]
    pub start_with: NaiveDate,
    #[schema(example = "2025-06-30")]
    pub ends_with: NaiveDate,
}

/// Shared by academic years and semesters.
pub fn ensure_ordered(start_with: NaiveDate, ends_with: NaiveDate) -> Result<(), AppError> {
    if ends_with < start_with {
        return Err(AppError::bad_request("ends_with must not be before start_with"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_day_periods_are_allowed() {
        let day = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        assert!(ensure_ordered(day, day).is_ok());
        assert!(ensure_ordered(day, day.pred_opt().unwrap()).is_err());
    }
}
