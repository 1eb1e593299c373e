use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::audit::Auditable;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub role_id: i64,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Role {
    fn table_name() -> &'static str {
        "roles"
    }

    fn row_id(&self) -> i64 {
        self.role_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    #[schema(example = "dean")]
    pub role_name: String,
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub permission_id: i64,
    pub permission_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Permission {
    fn table_name() -> &'static str {
        "permissions"
    }

    fn row_id(&self) -> i64 {
        self.permission_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionRequest {
    #[schema(example = "gradejournal:list")]
    pub permission_name: String,
}

// =============================================================================
// USER-ROLE ASSIGNMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserRole {
    pub user_id: i64,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for UserRole {
    fn table_name() -> &'static str {
        "user_roles"
    }

    fn row_id(&self) -> i64 {
        self.user_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserRoleRequest {
    pub user_id: i64,
    pub role_id: i64,
}

// =============================================================================
// ROLE-PERMISSION ASSIGNMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RolePermission {
    pub role_id: i64,
    pub permission_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for RolePermission {
    fn table_name() -> &'static str {
        "role_permissions"
    }

    fn row_id(&self) -> i64 {
        self.role_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RolePermissionRequest {
    pub role_id: i64,
    pub permission_id: i64,
}
