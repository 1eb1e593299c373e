//! Well-known roles and permissions. Every statement is idempotent so
//! `seed` can run against a live database.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::authz::{permissions, roles};
use crate::utils::utc_now;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: u64,
    pub permissions_created: u64,
    pub grants_created: u64,
}

/// Creates the `admin`, `teacher` and `student` roles and every permission a
/// route can require. `admin` is granted all of them; the other two get their
/// default grants.
pub async fn seed_rbac(pool: &SqlitePool) -> Result<SeedReport, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();
    let now = utc_now();

    for role in roles::ALL {
        report.roles_created += sqlx::query(
            "INSERT INTO roles (role_name, created_at, updated_at) VALUES (?, ?, ?) ON CONFLICT(role_name) DO NOTHING",
        )
        .bind(role)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for permission in permissions::ALL {
        report.permissions_created += sqlx::query(
            "INSERT INTO permissions (permission_name, created_at, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(permission_name) DO NOTHING",
        )
        .bind(permission)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    report.grants_created += grant_all(&mut tx, roles::ADMIN, permissions::ALL).await?;
    report.grants_created += grant_all(&mut tx, roles::TEACHER, permissions::TEACHER_DEFAULTS).await?;
    report.grants_created += grant_all(&mut tx, roles::STUDENT, permissions::STUDENT_DEFAULTS).await?;

    tx.commit().await?;
    tracing::info!(?report, "rbac seed applied");
    Ok(report)
}

async fn grant_all(tx: &mut Transaction<'_, Sqlite>, role: &str, names: &[&str]) -> Result<u64, sqlx::Error> {
    let now = utc_now();
    let mut created = 0;
    for name in names {
        created += sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id, created_at, updated_at) \
             SELECT r.role_id, p.permission_id, ?, ? FROM roles r, permissions p \
             WHERE r.role_name = ? AND p.permission_name = ? \
             ON CONFLICT(role_id, permission_id) DO NOTHING",
        )
        .bind(now)
        .bind(now)
        .bind(role)
        .bind(name)
        .execute(&mut **tx)
        .await?
        .rows_affected();
    }
    Ok(created)
}

#[derive(Debug, thiserror::Error)]
pub enum GrantRoleError {
    #[error("no user with email {0}")]
    UnknownUser(String),
    #[error("no role named {0}")]
    UnknownRole(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Assigns `role` to the user registered under `email`. Returns `false` when
/// the user already had it.
pub async fn grant_role(pool: &SqlitePool, email: &str, role: &str) -> Result<bool, GrantRoleError> {
    let email = email.trim().to_lowercase();

    let user_id: i64 = sqlx::query_scalar("SELECT user_id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| GrantRoleError::UnknownUser(email.clone()))?;

    let role_id: i64 = sqlx::query_scalar("SELECT role_id FROM roles WHERE role_name = ?")
        .bind(role)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| GrantRoleError::UnknownRole(role.to_string()))?;

    let now = utc_now();
    let inserted = sqlx::query(
        "INSERT INTO user_roles (user_id, role_id, created_at, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(user_id, role_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(inserted == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn seeding_twice_creates_nothing_new() {
        let pool = pool().await;

        let first = seed_rbac(&pool).await.unwrap();
        assert_eq!(first.roles_created, roles::ALL.len() as u64);
        assert_eq!(first.permissions_created, permissions::ALL.len() as u64);

        let second = seed_rbac(&pool).await.unwrap();
        assert_eq!(second, SeedReport::default());
    }

    #[tokio::test]
    async fn grant_role_requires_known_user_and_role() {
        let pool = pool().await;
        seed_rbac(&pool).await.unwrap();

        let err = grant_role(&pool, "ghost@example.com", roles::ADMIN).await.unwrap_err();
        assert!(matches!(err, GrantRoleError::UnknownUser(_)));

        let now = utc_now();
        sqlx::query(
            "INSERT INTO users (first_name, last_name, email, password_hash, created_at, updated_at) \
             VALUES ('Ada', 'Lovelace', 'ada@example.com', 'x', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        let err = grant_role(&pool, "ada@example.com", "dean").await.unwrap_err();
        assert!(matches!(err, GrantRoleError::UnknownRole(_)));

        assert!(grant_role(&pool, "ADA@example.com", roles::ADMIN).await.unwrap());
        assert!(!grant_role(&pool, "ada@example.com", roles::ADMIN).await.unwrap());
    }
}
