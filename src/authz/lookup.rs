use async_trait::async_trait;
use sqlx::SqlitePool;

use super::permission_set::PermissionSet;

/// Storage could not answer a role or grant query. Never read as "no
/// permissions".
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for LookupError {
    fn from(value: sqlx::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

/// Role memberships of a subject.
#[async_trait]
pub trait SubjectRoles: Send + Sync {
    async fn roles_for_subject(&self, subject_id: i64) -> Result<Vec<i64>, LookupError>;
}

/// Permission names granted to a role.
#[async_trait]
pub trait RoleGrants: Send + Sync {
    async fn permissions_for_role(&self, role_id: i64) -> Result<Vec<String>, LookupError>;
}

/// Union of the permissions of every role the subject holds.
///
/// A subject with no roles resolves to an empty set. The first failing
/// lookup aborts resolution.
pub async fn resolve_permissions(
    subjects: &dyn SubjectRoles,
    grants: &dyn RoleGrants,
    subject_id: i64,
) -> Result<PermissionSet, LookupError> {
    let role_ids = subjects.roles_for_subject(subject_id).await?;

    let mut set = PermissionSet::new();
    for role_id in role_ids {
        let names = grants.permissions_for_role(role_id).await?;
        set.extend(names);
    }

    Ok(set)
}

/// Both lookups over the `user_roles` / `role_permissions` tables.
#[derive(Debug, Clone)]
pub struct SqliteRoleGraph {
    pool: SqlitePool,
}

impl SqliteRoleGraph {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectRoles for SqliteRoleGraph {
    async fn roles_for_subject(&self, subject_id: i64) -> Result<Vec<i64>, LookupError> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT role_id FROM user_roles WHERE user_id = ? ORDER BY role_id")
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl RoleGrants for SqliteRoleGraph {
    async fn permissions_for_role(&self, role_id: i64) -> Result<Vec<String>, LookupError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.permission_name
            FROM role_permissions rp
            JOIN permissions p ON p.permission_id = rp.permission_id
            WHERE rp.role_id = ?
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeGraph {
        memberships: HashMap<i64, Vec<i64>>,
        grants: HashMap<i64, Vec<String>>,
        failing_role: Option<i64>,
        grant_calls: AtomicUsize,
    }

    impl FakeGraph {
        fn member(mut self, subject: i64, roles: &[i64]) -> Self {
            self.memberships.insert(subject, roles.to_vec());
            self
        }

        fn grant(mut self, role: i64, perms: &[&str]) -> Self {
            self.grants.insert(role, perms.iter().map(|p| p.to_string()).collect());
            self
        }
    }

    #[async_trait]
    impl SubjectRoles for FakeGraph {
        async fn roles_for_subject(&self, subject_id: i64) -> Result<Vec<i64>, LookupError> {
            Ok(self.memberships.get(&subject_id).cloned().unwrap_or_default())
        }
    }

    #[async_trait]
    impl RoleGrants for FakeGraph {
        async fn permissions_for_role(&self, role_id: i64) -> Result<Vec<String>, LookupError> {
            self.grant_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_role == Some(role_id) {
                return Err(LookupError::Storage("connection reset".into()));
            }
            Ok(self.grants.get(&role_id).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn union_of_all_roles() {
        let graph = FakeGraph::default()
            .member(1, &[10, 20])
            .grant(10, &["user:list", "user:view"])
            .grant(20, &["user:view", "role:list"]);

        let set = resolve_permissions(&graph, &graph, 1).await.unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("user:list"));
        assert!(set.contains("role:list"));
    }

    #[tokio::test]
    async fn zero_roles_is_empty_not_error() {
        let graph = FakeGraph::default();
        let set = resolve_permissions(&graph, &graph, 404).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(graph.grant_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn role_without_grants_contributes_nothing() {
        let graph = FakeGraph::default().member(1, &[10, 11]).grant(10, &["user:list"]);
        let set = resolve_permissions(&graph, &graph, 1).await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced() {
        let mut graph = FakeGraph::default()
            .member(1, &[10, 20])
            .grant(10, &["user:list"])
            .grant(20, &["user:view"]);
        graph.failing_role = Some(20);

        let err = resolve_permissions(&graph, &graph, 1).await.unwrap_err();
        assert!(matches!(err, LookupError::Storage(_)));
    }

    #[tokio::test]
    async fn sqlite_graph_reads_roles_and_grants() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();

        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO users (user_id, first_name, last_name, email, password_hash, created_at, updated_at) VALUES (1, 'A', 'B', 'a@b.c', 'x', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO roles (role_id, role_name, created_at, updated_at) VALUES (5, 'auditor', ?, ?)")
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO permissions (permission_id, permission_name, created_at, updated_at) VALUES (9, 'AuditLog:List', ?, ?)")
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO user_roles (user_id, role_id, created_at, updated_at) VALUES (1, 5, ?, ?)")
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id, created_at, updated_at) VALUES (5, 9, ?, ?)")
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();

        let graph = SqliteRoleGraph::new(pool);
        assert_eq!(graph.roles_for_subject(1).await.unwrap(), vec![5]);
        assert_eq!(graph.permissions_for_role(5).await.unwrap(), vec!["AuditLog:List".to_string()]);

        let set = resolve_permissions(&graph, &graph, 1).await.unwrap();
        assert!(set.contains("auditlog:list"));
    }

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    proptest! {
        #[test]
        fn adding_a_role_never_removes_permissions(
            grants in prop::collection::vec(prop::collection::vec("[a-z]{1,6}:[a-z]{1,6}", 0..5), 1..6),
            extra in prop::collection::vec("[a-z]{1,6}:[a-z]{1,6}", 0..5),
        ) {
            let mut graph = FakeGraph::default();
            let role_ids: Vec<i64> = (0..grants.len() as i64).collect();
            for (role, perms) in role_ids.iter().zip(&grants) {
                graph.grants.insert(*role, perms.clone());
            }
            let extra_role = grants.len() as i64;
            graph.grants.insert(extra_role, extra.clone());

            graph.memberships.insert(1, role_ids.clone());
            let mut with_extra = role_ids.clone();
            with_extra.push(extra_role);
            graph.memberships.insert(2, with_extra);

            let before = run(resolve_permissions(&graph, &graph, 1)).unwrap();
            let after = run(resolve_permissions(&graph, &graph, 2)).unwrap();

            prop_assert!(after.is_superset(&before));
            for perms in &grants {
                for p in perms {
                    prop_assert!(before.contains(p));
                }
            }
            for p in &extra {
                prop_assert!(after.contains(p));
            }
        }
    }
}
