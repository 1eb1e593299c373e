//! Append-only audit trail of mutations.
//!
//! Handlers hand entries to [`AuditRecorder`] after a successful write. The
//! recorder never blocks and never fails the request; a background task
//! started with [`start_audit_listener`] persists entries into `audit_log`,
//! chaining each row to the previous one with a SHA-256 hash.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub mod auditable;
pub use auditable::{AuditAction, Auditable};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub occurred_at: DateTime<Utc>,
    pub user_id: Option<i64>,
    pub table_name: String,
    pub row_id: i64,
    pub action: AuditAction,
    pub old_data: Option<String>,
    pub new_data: Option<String>,
    pub comment: Option<String>,
}

impl AuditEntry {
    pub fn new(table_name: impl Into<String>, row_id: i64, action: AuditAction) -> Self {
        let table_name = table_name.into();
        Self {
            occurred_at: Utc::now(),
            user_id: None,
            comment: Some(action.describe(&table_name)),
            table_name,
            row_id,
            action,
            old_data: None,
            new_data: None,
        }
    }

    pub fn by(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn old<T: Serialize>(mut self, value: &T) -> Self {
        self.old_data = to_json(value);
        self
    }

    pub fn new_data<T: Serialize>(mut self, value: &T) -> Self {
        self.new_data = to_json(value);
        self
    }
}

fn to_json<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::warn!(error = %err, "could not serialize audit payload");
            None
        }
    }
}

/// Fire-and-forget handle shared through `AppState`.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    tx: broadcast::Sender<AuditEntry>,
}

impl AuditRecorder {
    pub fn new() -> (Self, broadcast::Receiver<AuditEntry>) {
        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.tx.subscribe()
    }

    pub fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.send(entry) {
            tracing::warn!(
                table = %err.0.table_name,
                row_id = err.0.row_id,
                "audit listener not running, entry dropped"
            );
        }
    }

    pub fn created<T: Auditable>(&self, actor: i64, row: &T) {
        self.record(AuditEntry::new(T::table_name(), row.row_id(), AuditAction::Create).by(actor).new_data(row));
    }

    pub fn updated<T: Auditable>(&self, actor: i64, old: &T, new: &T) {
        self.record(
            AuditEntry::new(T::table_name(), new.row_id(), AuditAction::Update)
                .by(actor)
                .old(old)
                .new_data(new),
        );
    }

    pub fn deleted<T: Auditable>(&self, actor: i64, old: &T) {
        self.record(AuditEntry::new(T::table_name(), old.row_id(), AuditAction::Delete).by(actor).old(old));
    }

    pub fn assigned<T: Auditable>(&self, actor: i64, link: &T) {
        self.record(AuditEntry::new(T::table_name(), link.row_id(), AuditAction::Assign).by(actor).new_data(link));
    }

    pub fn removed<T: Auditable>(&self, actor: i64, link: &T) {
        self.record(AuditEntry::new(T::table_name(), link.row_id(), AuditAction::Remove).by(actor).old(link));
    }
}

/// Fields covered by the row hash, serialized in this order.
#[derive(Serialize)]
struct ChainedFields<'a> {
    created_at: &'a DateTime<Utc>,
    user_id: Option<i64>,
    table_name: &'a str,
    row_id: i64,
    action_type: &'a str,
    old_data: Option<&'a str>,
    new_data: Option<&'a str>,
    comment: Option<&'a str>,
}

/// `sha256(prev_hash || canonical json)`, hex encoded.
fn chain_hash(prev_hash: Option<&str>, fields: &ChainedFields<'_>) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(serde_json::to_string(fields).unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

async fn persist(pool: &SqlitePool, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY audit_id DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;

    let fields = ChainedFields {
        created_at: &entry.occurred_at,
        user_id: entry.user_id,
        table_name: &entry.table_name,
        row_id: entry.row_id,
        action_type: entry.action.as_str(),
        old_data: entry.old_data.as_deref(),
        new_data: entry.new_data.as_deref(),
        comment: entry.comment.as_deref(),
    };
    let hash = chain_hash(prev_hash.as_deref(), &fields);

    sqlx::query(
        r#"
        INSERT INTO audit_log (created_at, user_id, table_name, row_id, action_type, old_data, new_data, comment, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.occurred_at)
    .bind(entry.user_id)
    .bind(&entry.table_name)
    .bind(entry.row_id)
    .bind(entry.action.as_str())
    .bind(&entry.old_data)
    .bind(&entry.new_data)
    .bind(&entry.comment)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

pub async fn start_audit_listener(mut rx: broadcast::Receiver<AuditEntry>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        match rx.recv().await {
            Ok(entry) => {
                if let Err(err) = persist(&pool, &entry).await {
                    tracing::error!(
                        error = %err,
                        table = %entry.table_name,
                        row_id = entry.row_id,
                        "failed to write audit log"
                    );
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::error!(skipped, "audit listener lagged, entries lost");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("audit listener stopped");
}

#[derive(sqlx::FromRow)]
struct StoredRow {
    audit_id: i64,
    created_at: DateTime<Utc>,
    user_id: Option<i64>,
    table_name: String,
    row_id: i64,
    action_type: String,
    old_data: Option<String>,
    new_data: Option<String>,
    comment: Option<String>,
    prev_hash: Option<String>,
    hash: String,
}

/// Walks the chain from the first row. Returns the id of the first row whose
/// link or hash does not match, or `None` when the log is intact.
pub async fn verify_chain(pool: &SqlitePool) -> Result<Option<i64>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredRow>(
        "SELECT audit_id, created_at, user_id, table_name, row_id, action_type, old_data, new_data, comment, prev_hash, hash FROM audit_log ORDER BY audit_id",
    )
    .fetch_all(pool)
    .await?;

    let mut expected_prev: Option<String> = None;
    for row in rows {
        if row.prev_hash != expected_prev {
            return Ok(Some(row.audit_id));
        }
        let fields = ChainedFields {
            created_at: &row.created_at,
            user_id: row.user_id,
            table_name: &row.table_name,
            row_id: row.row_id,
            action_type: &row.action_type,
            old_data: row.old_data.as_deref(),
            new_data: row.new_data.as_deref(),
            comment: row.comment.as_deref(),
        };
        if chain_hash(row.prev_hash.as_deref(), &fields) != row.hash {
            return Ok(Some(row.audit_id));
        }
        expected_prev = Some(row.hash);
    }

    Ok(None)
}
