//! SQLite admin store implementation.
//!
//! Principals are stored as `(kind, principal)` pairs: numeric ids as their
//! decimal text, handles already canonicalized by the registry.

use chrono::{SecondsFormat, Utc};
use ledgerbot_core::repository::admin::AdminStore;
use ledgerbot_types::admin::Principal;
use ledgerbot_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AdminStore`.
pub struct SqliteAdminStore {
    pool: DatabasePool,
}

impl SqliteAdminStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn to_columns(principal: &Principal) -> (&'static str, String) {
    match principal {
        Principal::Id(id) => ("id", id.to_string()),
        Principal::Handle(handle) => ("handle", handle.clone()),
    }
}

fn from_columns(kind: &str, value: String) -> Result<Principal, RepositoryError> {
    match kind {
        "id" => value
            .parse::<i64>()
            .map(Principal::Id)
            .map_err(|e| RepositoryError::Query(format!("invalid admin id '{value}': {e}"))),
        "handle" => Ok(Principal::Handle(value)),
        other => Err(RepositoryError::Query(format!("unknown principal kind: {other}"))),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl AdminStore for SqliteAdminStore {
    async fn load(&self) -> Result<Vec<Principal>, RepositoryError> {
        let rows = sqlx::query("SELECT kind, principal FROM admins ORDER BY is_primary DESC, added_at ASC, rowid ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut principals = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind: String = row
                .try_get("kind")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let value: String = row
                .try_get("principal")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            principals.push(from_columns(&kind, value)?);
        }
        Ok(principals)
    }

    async fn insert(&self, principal: &Principal, is_primary: bool) -> Result<bool, RepositoryError> {
        let (kind, value) = to_columns(principal);
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO admins (kind, principal, is_primary, added_at) VALUES (?, ?, ?, ?)",
        )
        .bind(kind)
        .bind(&value)
        .bind(is_primary)
        .bind(now())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .rows_affected()
            > 0;

        // Only one row carries the primary flag; a previous primary becomes an
        // ordinary, removable admin.
        if is_primary {
            sqlx::query("UPDATE admins SET is_primary = 0 WHERE is_primary = 1 AND NOT (kind = ? AND principal = ?)")
                .bind(kind)
                .bind(&value)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        // A configured primary that was previously an ordinary admin is promoted.
        if is_primary && !inserted {
            sqlx::query("UPDATE admins SET is_primary = 1 WHERE kind = ? AND principal = ?")
                .bind(kind)
                .bind(&value)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(inserted)
    }

    async fn insert_many(&self, principals: &[Principal]) -> Result<usize, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let added_at = now();
        let mut added = 0;
        for principal in principals {
            let (kind, value) = to_columns(principal);
            let result = sqlx::query(
                "INSERT OR IGNORE INTO admins (kind, principal, is_primary, added_at) VALUES (?, ?, 0, ?)",
            )
            .bind(kind)
            .bind(&value)
            .bind(&added_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
            added += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(added)
    }

    async fn delete(&self, principal: &Principal) -> Result<bool, RepositoryError> {
        let (kind, value) = to_columns(principal);
        let result = sqlx::query("DELETE FROM admins WHERE kind = ? AND principal = ? AND is_primary = 0")
            .bind(kind)
            .bind(&value)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbot_core::admin::AdminRegistry;
    use ledgerbot_types::admin::Requester;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn test_store() -> SqliteAdminStore {
        SqliteAdminStore::new(test_pool().await)
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = test_store().await;
        assert!(store.insert(&Principal::Id(1), true).await.unwrap());
        assert!(store.insert(&Principal::handle("@Alice"), false).await.unwrap());
        assert!(!store.insert(&Principal::Id(1), false).await.unwrap());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![Principal::Id(1), Principal::Handle("alice".to_string())]);
    }

    #[tokio::test]
    async fn test_id_and_handle_do_not_collide() {
        let store = test_store().await;
        assert!(store.insert(&Principal::Id(42), false).await.unwrap());
        assert!(store.insert(&Principal::Handle("42".to_string()), false).await.unwrap());
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_primary_cannot_be_deleted() {
        let store = test_store().await;
        store.insert(&Principal::Id(1), true).await.unwrap();
        store.insert(&Principal::Id(2), false).await.unwrap();

        assert!(!store.delete(&Principal::Id(1)).await.unwrap());
        assert!(store.delete(&Principal::Id(2)).await.unwrap());
        assert!(!store.delete(&Principal::Id(2)).await.unwrap());
        assert_eq!(store.load().await.unwrap(), vec![Principal::Id(1)]);
    }

    #[tokio::test]
    async fn test_promoted_primary_survives_delete() {
        let store = test_store().await;
        store.insert(&Principal::Id(7), false).await.unwrap();
        assert!(!store.insert(&Principal::Id(7), true).await.unwrap());
        assert!(!store.delete(&Principal::Id(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_new_primary_demotes_previous_one() {
        let store = test_store().await;
        store.insert(&Principal::Id(1), true).await.unwrap();
        store.insert(&Principal::Id(2), true).await.unwrap();

        assert!(!store.delete(&Principal::Id(2)).await.unwrap());
        assert!(store.delete(&Principal::Id(1)).await.unwrap());
        assert_eq!(store.load().await.unwrap(), vec![Principal::Id(2)]);
    }

    #[tokio::test]
    async fn test_former_primary_removal_survives_restart() {
        let pool = test_pool().await;
        AdminRegistry::open(SqliteAdminStore::new(pool.clone()), Principal::Id(1))
            .await
            .unwrap();

        let reg = AdminRegistry::open(SqliteAdminStore::new(pool.clone()), Principal::Id(2))
            .await
            .unwrap();
        assert!(reg.contains(&Principal::Id(1)).await);
        reg.remove(&Principal::Id(1), &Requester::new(2)).await.unwrap();

        let reopened = AdminRegistry::open(SqliteAdminStore::new(pool), Principal::Id(2))
            .await
            .unwrap();
        assert!(!reopened.contains(&Principal::Id(1)).await);
        assert!(reopened.contains(&Principal::Id(2)).await);
    }

    #[tokio::test]
    async fn test_insert_many_counts_new_rows() {
        let store = test_store().await;
        store.insert(&Principal::Id(1), true).await.unwrap();

        let added = store
            .insert_many(&[Principal::Id(1), Principal::Id(2), Principal::handle("bob")])
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.load().await.unwrap().len(), 3);
    }
}
