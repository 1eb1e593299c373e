//! Authorization: bearer identity, role/permission resolution and the
//! per-route permission gate.
//!
//! A protected request flows through [`identity::authenticate`], which puts
//! the decoded [`Claims`](crate::jwt::Claims) into the request extensions,
//! and then through a [`RequirePermission`] layer, which resolves the
//! caller's effective permissions and allows or refuses the call.
//!
//! Nothing here caches across requests: a role removed between two requests
//! is no longer honoured on the second one.

mod evaluator;
mod gate;
pub mod identity;
mod lookup;
mod permission_set;

pub use evaluator::{Authorizer, Decision};
pub use gate::{PermissionGate, RequirePermission};
pub use lookup::{resolve_permissions, LookupError, RoleGrants, SqliteRoleGraph, SubjectRoles};
pub use permission_set::PermissionSet;

/// Well-known role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const TEACHER: &str = "teacher";
    pub const STUDENT: &str = "student";

    pub const ALL: &[&str] = &[ADMIN, TEACHER, STUDENT];
}

/// Well-known permission names, `resource:action`.
pub mod permissions {
    // User
    pub const USER_LIST: &str = "user:list";
    pub const USER_VIEW: &str = "user:view";
    pub const USER_UPDATE: &str = "user:update";
    pub const USER_DELETE: &str = "user:delete";

    // Teacher
    pub const TEACHER_CREATE: &str = "teacher:create";
    pub const TEACHER_LIST: &str = "teacher:list";
    pub const TEACHER_VIEW: &str = "teacher:view";
    pub const TEACHER_UPDATE: &str = "teacher:update";
    pub const TEACHER_DELETE: &str = "teacher:delete";
    pub const TEACHER_VIEW_SELF: &str = "teacher:view_self";
    pub const TEACHER_UPDATE_SELF: &str = "teacher:update_self";
    pub const TEACHER_LIST_PUBLIC: &str = "teacher:list_public";
    pub const TEACHER_VIEW_PUBLIC: &str = "teacher:view_public";

    // Student
    pub const STUDENT_CREATE: &str = "student:create";
    pub const STUDENT_LIST: &str = "student:list";
    pub const STUDENT_VIEW: &str = "student:view";
    pub const STUDENT_UPDATE: &str = "student:update";
    pub const STUDENT_DELETE: &str = "student:delete";
    pub const STUDENT_LIST_PUBLIC: &str = "student:list_public";
    pub const STUDENT_VIEW_PUBLIC: &str = "student:view_public";

    // Student group
    pub const STUDENT_GROUP_CREATE: &str = "studentgroup:create";
    pub const STUDENT_GROUP_LIST: &str = "studentgroup:list";
    pub const STUDENT_GROUP_VIEW: &str = "studentgroup:view";
    pub const STUDENT_GROUP_UPDATE: &str = "studentgroup:update";
    pub const STUDENT_GROUP_DELETE: &str = "studentgroup:delete";
    pub const STUDENT_GROUP_LIST_PUBLIC: &str = "studentgroup:list_public";
    pub const STUDENT_GROUP_VIEW_PUBLIC: &str = "studentgroup:view_public";

    // RBAC
    pub const PERMISSION_CREATE: &str = "permission:create";
    pub const PERMISSION_LIST: &str = "permission:list";
    pub const PERMISSION_VIEW: &str = "permission:view";
    pub const PERMISSION_UPDATE: &str = "permission:update";
    pub const PERMISSION_DELETE: &str = "permission:delete";
    pub const ROLE_CREATE: &str = "role:create";
    pub const ROLE_LIST: &str = "role:list";
    pub const ROLE_VIEW: &str = "role:view";
    pub const ROLE_UPDATE: &str = "role:update";
    pub const ROLE_DELETE: &str = "role:delete";
    pub const USER_ROLE_ASSIGN: &str = "userrole:assign";
    pub const USER_ROLE_REMOVE: &str = "userrole:remove";
    pub const USER_ROLE_VIEW: &str = "userrole:view";
    pub const ROLE_PERMISSION_ASSIGN: &str = "rolepermission:assign";
    pub const ROLE_PERMISSION_REMOVE: &str = "rolepermission:remove";
    pub const ROLE_PERMISSION_VIEW: &str = "rolepermission:view";

    // Curriculum
    pub const CURRICULUM_CREATE: &str = "curriculum:create";
    pub const CURRICULUM_LIST: &str = "curriculum:list";
    pub const CURRICULUM_VIEW: &str = "curriculum:view";
    pub const CURRICULUM_UPDATE: &str = "curriculum:update";
    pub const CURRICULUM_DELETE: &str = "curriculum:delete";

    // Grade journal
    pub const GRADE_JOURNAL_CREATE: &str = "gradejournal:create";
    pub const GRADE_JOURNAL_LIST: &str = "gradejournal:list";
    pub const GRADE_JOURNAL_VIEW: &str = "gradejournal:view";
    pub const GRADE_JOURNAL_UPDATE: &str = "gradejournal:update";
    pub const GRADE_JOURNAL_DELETE: &str = "gradejournal:delete";
    pub const GRADE_JOURNAL_LIST_PUBLIC: &str = "gradejournal:list_public";
    pub const GRADE_JOURNAL_AVG: &str = "gradejournal:avg";

    // Attendance
    pub const ATTENDANCE_CREATE: &str = "attendance:create";
    pub const ATTENDANCE_LIST: &str = "attendance:list";
    pub const ATTENDANCE_VIEW: &str = "attendance:view";
    pub const ATTENDANCE_UPDATE: &str = "attendance:update";
    pub const ATTENDANCE_DELETE: &str = "attendance:delete";

    // Semester
    pub const SEMESTER_CREATE: &str = "semester:create";
    pub const SEMESTER_LIST: &str = "semester:list";
    pub const SEMESTER_VIEW: &str = "semester:view";
    pub const SEMESTER_UPDATE: &str = "semester:update";
    pub const SEMESTER_DELETE: &str = "semester:delete";

    // Discipline
    pub const DISCIPLINE_CREATE: &str = "discipline:create";
    pub const DISCIPLINE_LIST: &str = "discipline:list";
    pub const DISCIPLINE_VIEW: &str = "discipline:view";
    pub const DISCIPLINE_UPDATE: &str = "discipline:update";
    pub const DISCIPLINE_DELETE: &str = "discipline:delete";
    pub const DISCIPLINE_LIST_PUBLIC: &str = "discipline:list_public";
    pub const DISCIPLINE_VIEW_PUBLIC: &str = "discipline:view_public";

    // Academic year
    pub const ACADEMIC_YEAR_CREATE: &str = "academicyear:create";
    pub const ACADEMIC_YEAR_LIST: &str = "academicyear:list";
    pub const ACADEMIC_YEAR_VIEW: &str = "academicyear:view";
    pub const ACADEMIC_YEAR_UPDATE: &str = "academicyear:update";
    pub const ACADEMIC_YEAR_DELETE: &str = "academicyear:delete";

    // Audit
    pub const AUDIT_LOG_LIST: &str = "auditlog:list";

    /// Every permission a route can require. Seeded into storage by the CLI.
    pub const ALL: &[&str] = &[
        USER_LIST,
        USER_VIEW,
        USER_UPDATE,
        USER_DELETE,
        TEACHER_CREATE,
        TEACHER_LIST,
        TEACHER_VIEW,
        TEACHER_UPDATE,
        TEACHER_DELETE,
        TEACHER_VIEW_SELF,
        TEACHER_UPDATE_SELF,
        TEACHER_LIST_PUBLIC,
        TEACHER_VIEW_PUBLIC,
        STUDENT_CREATE,
        STUDENT_LIST,
        STUDENT_VIEW,
        STUDENT_UPDATE,
        STUDENT_DELETE,
        STUDENT_LIST_PUBLIC,
        STUDENT_VIEW_PUBLIC,
        STUDENT_GROUP_CREATE,
        STUDENT_GROUP_LIST,
        STUDENT_GROUP_VIEW,
        STUDENT_GROUP_UPDATE,
        STUDENT_GROUP_DELETE,
        STUDENT_GROUP_LIST_PUBLIC,
        STUDENT_GROUP_VIEW_PUBLIC,
        PERMISSION_CREATE,
        PERMISSION_LIST,
        PERMISSION_VIEW,
        PERMISSION_UPDATE,
        PERMISSION_DELETE,
        ROLE_CREATE,
        ROLE_LIST,
        ROLE_VIEW,
        ROLE_UPDATE,
        ROLE_DELETE,
        USER_ROLE_ASSIGN,
        USER_ROLE_REMOVE,
        USER_ROLE_VIEW,
        ROLE_PERMISSION_ASSIGN,
        ROLE_PERMISSION_REMOVE,
        ROLE_PERMISSION_VIEW,
        CURRICULUM_CREATE,
        CURRICULUM_LIST,
        CURRICULUM_VIEW,
        CURRICULUM_UPDATE,
        CURRICULUM_DELETE,
        GRADE_JOURNAL_CREATE,
        GRADE_JOURNAL_LIST,
        GRADE_JOURNAL_VIEW,
        GRADE_JOURNAL_UPDATE,
        GRADE_JOURNAL_DELETE,
        GRADE_JOURNAL_LIST_PUBLIC,
        GRADE_JOURNAL_AVG,
        ATTENDANCE_CREATE,
        ATTENDANCE_LIST,
        ATTENDANCE_VIEW,
        ATTENDANCE_UPDATE,
        ATTENDANCE_DELETE,
        SEMESTER_CREATE,
        SEMESTER_LIST,
        SEMESTER_VIEW,
        SEMESTER_UPDATE,
        SEMESTER_DELETE,
        DISCIPLINE_CREATE,
        DISCIPLINE_LIST,
        DISCIPLINE_VIEW,
        DISCIPLINE_UPDATE,
        DISCIPLINE_DELETE,
        DISCIPLINE_LIST_PUBLIC,
        DISCIPLINE_VIEW_PUBLIC,
        ACADEMIC_YEAR_CREATE,
        ACADEMIC_YEAR_LIST,
        ACADEMIC_YEAR_VIEW,
        ACADEMIC_YEAR_UPDATE,
        ACADEMIC_YEAR_DELETE,
        AUDIT_LOG_LIST,
    ];

    /// Read-mostly grants for the `teacher` role created by `seed`.
    pub const TEACHER_DEFAULTS: &[&str] = &[
        TEACHER_VIEW_SELF,
        TEACHER_UPDATE_SELF,
        STUDENT_LIST_PUBLIC,
        STUDENT_VIEW_PUBLIC,
        STUDENT_GROUP_LIST_PUBLIC,
        STUDENT_GROUP_VIEW_PUBLIC,
        DISCIPLINE_LIST_PUBLIC,
        DISCIPLINE_VIEW_PUBLIC,
        CURRICULUM_LIST,
        CURRICULUM_VIEW,
        GRADE_JOURNAL_CREATE,
        GRADE_JOURNAL_LIST,
        GRADE_JOURNAL_VIEW,
        GRADE_JOURNAL_UPDATE,
        GRADE_JOURNAL_LIST_PUBLIC,
        GRADE_JOURNAL_AVG,
        ATTENDANCE_CREATE,
        ATTENDANCE_LIST,
        ATTENDANCE_VIEW,
        ATTENDANCE_UPDATE,
        SEMESTER_LIST,
        ACADEMIC_YEAR_LIST,
    ];

    pub const STUDENT_DEFAULTS: &[&str] = &[
        TEACHER_LIST_PUBLIC,
        TEACHER_VIEW_PUBLIC,
        STUDENT_GROUP_VIEW_PUBLIC,
        DISCIPLINE_LIST_PUBLIC,
        DISCIPLINE_VIEW_PUBLIC,
        GRADE_JOURNAL_LIST_PUBLIC,
        GRADE_JOURNAL_AVG,
        SEMESTER_LIST,
        ACADEMIC_YEAR_LIST,
    ];
}

#[cfg(test)]
mod tests {
    use super::permissions;
    use std::collections::HashSet;

    #[test]
    fn permission_names_are_unique_and_lowercase() {
        let unique: HashSet<_> = permissions::ALL.iter().collect();
        assert_eq!(unique.len(), permissions::ALL.len());
        for name in permissions::ALL {
            assert_eq!(*name, name.to_lowercase());
            assert_eq!(name.matches(':').count(), 1, "{name} is not resource:action");
        }
    }

    #[test]
    fn role_defaults_are_known_permissions() {
        let all: HashSet<_> = permissions::ALL.iter().collect();
        for name in permissions::TEACHER_DEFAULTS.iter().chain(permissions::STUDENT_DEFAULTS) {
            assert!(all.contains(name), "{name} missing from ALL");
        }
    }
}
