//! HTTP handlers, one module per resource.
//!
//! Each resource module exposes `routes(&AppState)`, which wraps every
//! handler in the [`RequirePermission`](crate::authz::RequirePermission)
//! layer for the permission that route needs.

pub mod academic_years;
pub mod attendances;
pub mod audit_logs;
pub mod auth;
pub mod curricula;
pub mod disciplines;
pub mod grade_journals;
pub mod health;
pub mod permissions;
pub mod role_permissions;
pub mod roles;
pub mod semesters;
pub mod student_groups;
pub mod students;
pub mod teachers;
pub mod user_roles;
pub mod users;
