use std::sync::Arc;

use sqlx::SqlitePool;

use super::lookup::{resolve_permissions, LookupError, RoleGrants, SqliteRoleGraph, SubjectRoles};
use super::permission_set::PermissionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

/// Answers "may subject S do P" from the current role graph.
///
/// Evaluation order:
/// 1. resolve the subject's roles
/// 2. union the grants of those roles
/// 3. case-insensitive exact match against the required permission
#[derive(Clone)]
pub struct Authorizer {
    subjects: Arc<dyn SubjectRoles>,
    grants: Arc<dyn RoleGrants>,
}

impl Authorizer {
    pub fn new(subjects: Arc<dyn SubjectRoles>, grants: Arc<dyn RoleGrants>) -> Self {
        Self { subjects, grants }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        let graph = Arc::new(SqliteRoleGraph::new(pool));
        Self::new(graph.clone(), graph)
    }

    pub async fn permissions_for(&self, subject_id: i64) -> Result<PermissionSet, LookupError> {
        resolve_permissions(self.subjects.as_ref(), self.grants.as_ref(), subject_id).await
    }

    pub async fn decide(&self, subject_id: i64, permission: &str) -> Result<Decision, LookupError> {
        let granted = self.permissions_for(subject_id).await?;

        if granted.contains(permission) {
            tracing::debug!(user_id = subject_id, permission = %permission, "permission granted");
            Ok(Decision::Allowed)
        } else {
            tracing::debug!(
                user_id = subject_id,
                permission = %permission,
                granted = granted.len(),
                "permission denied"
            );
            Ok(Decision::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticGraph {
        roles: HashMap<i64, Vec<i64>>,
        grants: HashMap<i64, Vec<String>>,
    }

    #[async_trait]
    impl SubjectRoles for StaticGraph {
        async fn roles_for_subject(&self, subject_id: i64) -> Result<Vec<i64>, LookupError> {
            Ok(self.roles.get(&subject_id).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl RoleGrants for StaticGraph {
        async fn permissions_for_role(&self, role_id: i64) -> Result<Vec<String>, LookupError> {
            Ok(self.grants.get(&role_id).cloned().unwrap_or_default())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl SubjectRoles for Unavailable {
        async fn roles_for_subject(&self, _subject_id: i64) -> Result<Vec<i64>, LookupError> {
            Err(LookupError::Storage("database is locked".into()))
        }
    }

    #[async_trait]
    impl RoleGrants for Unavailable {
        async fn permissions_for_role(&self, _role_id: i64) -> Result<Vec<String>, LookupError> {
            Err(LookupError::Storage("database is locked".into()))
        }
    }

    fn authorizer() -> Authorizer {
        let graph = Arc::new(StaticGraph {
            roles: HashMap::from([(1, vec![100]), (2, vec![])]),
            grants: HashMap::from([(100, vec!["Student:List".to_string()])]),
        });
        Authorizer::new(graph.clone(), graph)
    }

    #[tokio::test]
    async fn test_granted_permission_allows() {
        let authz = authorizer();
        assert_eq!(authz.decide(1, "student:list").await.unwrap(), Decision::Allowed);
        assert_eq!(authz.decide(1, "STUDENT:LIST").await.unwrap(), Decision::Allowed);
    }

    #[tokio::test]
    async fn test_missing_permission_denies() {
        let authz = authorizer();
        assert_eq!(authz.decide(1, "student:delete").await.unwrap(), Decision::Denied);
    }

    #[tokio::test]
    async fn test_subject_without_roles_is_denied() {
        let authz = authorizer();
        assert_eq!(authz.decide(2, "student:list").await.unwrap(), Decision::Denied);
        assert_eq!(authz.decide(3, "student:list").await.unwrap(), Decision::Denied);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_a_denial() {
        let down = Arc::new(Unavailable);
        let authz = Authorizer::new(down.clone(), down);
        assert!(authz.decide(1, "student:list").await.is_err());
    }
}
