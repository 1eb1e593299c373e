use serde::{Deserialize, Serialize};

/// What happened to the audited row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    /// A link row was added (role to user, permission to role).
    Assign,
    /// A link row was removed.
    Remove,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Assign => "ASSIGN",
            AuditAction::Remove => "REMOVE",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            AuditAction::Create => "created",
            AuditAction::Update => "updated",
            AuditAction::Delete => "deleted",
            AuditAction::Assign => "assigned",
            AuditAction::Remove => "removed",
        }
    }

    /// Default comment stored with the entry, e.g. "grade_journals updated".
    pub fn describe(&self, table_name: &str) -> String {
        format!("{} {}", table_name, self.past_tense())
    }
}

/// Implemented by every model whose mutations land in the audit log.
pub trait Auditable: Serialize + Send + Sync {
    /// Table the row lives in; stored verbatim in `audit_log.table_name`.
    fn table_name() -> &'static str;

    fn row_id(&self) -> i64;
}
