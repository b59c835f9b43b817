//! Profile document storage and list appends
use crate::memory_db::repository::ProfileRepository;
use crate::memory_db::schema::*;
use anyhow::Context;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, info};

/// One JSON document per user, keyed by `user_id`
#[derive(Clone)]
pub struct ProfileStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    table: Arc<str>,
}

impl ProfileStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>, table: &str) -> Self {
        Self { pool, table: Arc::from(table) }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    fn read_document(&self, conn: &Connection, user_id: i64) -> anyhow::Result<Option<UserProfile>> {
        let document: Option<String> = conn
            .query_row(
                &format!("SELECT document FROM {} WHERE user_id = ?1", self.table),
                [user_id],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(json) => {
                let profile = serde_json::from_str(&json)
                    .with_context(|| format!("Profile document for user {} is not valid JSON", user_id))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    fn write_document(&self, conn: &Connection, profile: &UserProfile) -> anyhow::Result<()> {
        let document = serde_json::to_string(profile)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (user_id, document) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET document = excluded.document",
                self.table
            ),
            params![profile.user_id, document],
        )?;
        Ok(())
    }

    pub fn load(&self, user_id: i64) -> anyhow::Result<Option<UserProfile>> {
        let conn = self.get_conn()?;
        self.read_document(&conn, user_id)
    }

    pub fn store(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        self.write_document(&conn, profile)?;
        debug!("Stored profile for user {}", profile.user_id);
        Ok(())
    }

    pub fn remove(&self, user_id: i64) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE user_id = ?1", self.table),
            [user_id],
        )?;
        if deleted > 0 {
            info!("Deleted profile for user {}", user_id);
        }
        Ok(deleted)
    }

    /// Read-modify-write under an immediate transaction so concurrent
    /// appends serialize instead of overwriting each other.
    pub fn append_with<F>(&self, user_id: i64, updated_at: &str, mutate: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut profile = match self.read_document(&tx, user_id)? {
            Some(profile) => profile,
            None => {
                debug!("Creating sparse profile for user {} on first append", user_id);
                UserProfile::with_defaults(user_id)
            }
        };
        mutate(&mut profile);
        profile.updated_at = Some(updated_at.to_string());

        self.write_document(&tx, &profile)?;
        tx.commit()?;
        Ok(())
    }

    pub fn profile_count(&self) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn blocking<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ProfileStore) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .context("Profile store task panicked")?
    }
}

#[async_trait]
impl ProfileRepository for ProfileStore {
    async fn get_profile(&self, user_id: i64) -> anyhow::Result<Option<UserProfile>> {
        self.blocking(move |store| store.load(user_id)).await
    }

    async fn put_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let profile = profile.clone();
        self.blocking(move |store| store.store(&profile)).await
    }

    async fn delete_profile(&self, user_id: i64) -> anyhow::Result<bool> {
        self.blocking(move |store| store.remove(user_id).map(|deleted| deleted > 0)).await
    }

    async fn append_history(&self, user_id: i64, entry: &HistoryEntry, updated_at: &str) -> anyhow::Result<()> {
        let entry = entry.clone();
        let updated_at = updated_at.to_string();
        self.blocking(move |store| {
            store.append_with(user_id, &updated_at, |profile| profile.history.push(entry))
        })
        .await
    }

    async fn append_summary(
        &self,
        user_id: i64,
        summary: &ConversationSummary,
        updated_at: &str,
    ) -> anyhow::Result<()> {
        let summary = summary.clone();
        let updated_at = updated_at.to_string();
        self.blocking(move |store| {
            store.append_with(user_id, &updated_at, |profile| profile.summaries.push(summary))
        })
        .await
    }
}
