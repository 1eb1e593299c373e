use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::audit::Auditable;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub user_id: i64,
    pub phone: String,
    pub birthday: NaiveDate,
    pub student_group_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Student {
    fn table_name() -> &'static str {
        "students"
    }

    fn row_id(&self) -> i64 {
        self.user_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentCreateRequest {
    pub user_id: i64,
    pub phone: String,
    #[schema(example = "2005-04-12")]
    pub birthday: NaiveDate,
    pub student_group_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentUpdateRequest {
    pub phone: String,
    pub birthday: NaiveDate,
    pub student_group_id: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct StudentPublic {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birthday: NaiveDate,
    pub student_group_id: i64,
}
