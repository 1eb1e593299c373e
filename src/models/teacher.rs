use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::audit::Auditable;

/// Teacher profile, keyed by the owning user's id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Teacher {
    pub user_id: i64,
    pub phone: String,
    pub working_experience: Option<String>,
    pub education: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Teacher {
    fn table_name() -> &'static str {
        "teachers"
    }

    fn row_id(&self) -> i64 {
        self.user_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TeacherCreateRequest {
    pub user_id: i64,
    #[schema(example = "+7 900 000 00 00")]
    pub phone: String,
    pub working_experience: Option<String>,
    pub education: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TeacherUpdateRequest {
    pub phone: String,
    pub working_experience: Option<String>,
    pub education: Option<String>,
}

/// What any authenticated caller with `teacher:view_public` may see.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct TeacherPublic {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub education: Option<String>,
}
