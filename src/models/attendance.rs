use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::audit::Auditable;
use crate::models::pagination::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Attendance {
    pub attendance_id: i64,
    pub student_id: i64,
    pub discipline_id: i64,
    pub visit: bool,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Attendance {
    fn table_name() -> &'static str {
        "attendances"
    }

    fn row_id(&self) -> i64 {
        self.attendance_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceRequest {
    pub student_id: i64,
    pub discipline_id: i64,
    pub visit: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    pub student_id: Option<i64>,
    pub discipline_id: Option<i64>,
    /// Day the attendance was recorded (UTC).
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AttendanceFilter {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}
