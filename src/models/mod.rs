pub mod academic_year;
pub mod attendance;
pub mod audit_log;
pub mod curriculum;
pub mod discipline;
pub mod grade_journal;
pub mod pagination;
pub mod rbac;
pub mod semester;
pub mod student;
pub mod student_group;
pub mod teacher;
pub mod user;
