//! Conversation message storage and retrieval operations
use crate::memory_db::repository::ConversationRepository;
use crate::memory_db::schema::*;
use anyhow::Context;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use std::sync::Arc;
use tracing::debug;

/// Message log backed by one SQLite table keyed by `(user_id, timestamp)`
#[derive(Clone)]
pub struct ConversationStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    table: Arc<str>,
}

impl ConversationStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>, table: &str) -> Self {
        Self { pool, table: Arc::from(table) }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    pub fn insert_message(&self, message: &ConversationMessage) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        let keywords_json = serde_json::to_string(&message.keywords)?;

        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (user_id, timestamp, role, content, keywords)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                self.table
            ),
            params![
                message.user_id,
                &message.timestamp,
                message.role.as_str(),
                &message.content,
                keywords_json,
            ],
        )?;

        debug!("Stored {} message {} for user {}", message.role, message.timestamp, message.user_id);
        Ok(())
    }

    pub fn query_recent(&self, user_id: i64, limit: usize) -> anyhow::Result<Vec<ConversationMessage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id, timestamp, role, content, keywords
             FROM {} WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
            self.table
        ))?;

        let mut rows = stmt.query(params![user_id, limit as i64])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(Self::row_to_message(row)?);
        }
        Ok(messages)
    }

    pub fn query_all(&self, user_id: i64) -> anyhow::Result<Vec<ConversationMessage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id, timestamp, role, content, keywords
             FROM {} WHERE user_id = ?1 ORDER BY timestamp ASC",
            self.table
        ))?;

        let mut rows = stmt.query([user_id])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(Self::row_to_message(row)?);
        }
        Ok(messages)
    }

    pub fn remove_message(&self, user_id: i64, timestamp: &str) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE user_id = ?1 AND timestamp = ?2", self.table),
            params![user_id, timestamp],
        )?;
        Ok(deleted)
    }

    pub fn message_count(&self, user_id: i64) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE user_id = ?1", self.table),
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn check_connection(&self) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn row_to_message(row: &Row) -> anyhow::Result<ConversationMessage> {
        let role: String = row.get(2)?;
        let keywords_json: String = row.get(4)?;
        let timestamp: String = row.get(1)?;
        let keywords: Vec<String> = serde_json::from_str(&keywords_json)
            .with_context(|| format!("Keywords for message {} are not valid JSON", timestamp))?;

        Ok(ConversationMessage {
            user_id: row.get(0)?,
            timestamp,
            role: role.parse()?,
            content: row.get(3)?,
            keywords,
        })
    }

    async fn blocking<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ConversationStore) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .context("Conversation store task panicked")?
    }
}

#[async_trait]
impl ConversationRepository for ConversationStore {
    async fn put_message(&self, message: &ConversationMessage) -> anyhow::Result<()> {
        let message = message.clone();
        self.blocking(move |store| store.insert_message(&message)).await
    }

    async fn recent_messages(&self, user_id: i64, limit: usize) -> anyhow::Result<Vec<ConversationMessage>> {
        self.blocking(move |store| store.query_recent(user_id, limit)).await
    }

    async fn all_messages(&self, user_id: i64) -> anyhow::Result<Vec<ConversationMessage>> {
        self.blocking(move |store| store.query_all(user_id)).await
    }

    async fn delete_message(&self, user_id: i64, timestamp: &str) -> anyhow::Result<()> {
        let timestamp = timestamp.to_string();
        self.blocking(move |store| store.remove_message(user_id, &timestamp).map(|_| ())).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.blocking(|store| store.check_connection()).await
    }
}

#[cfg(test)]
mod tests {
    use crate::memory_db::{ConversationRepository, WellnessDatabase};
    use crate::memory_db::schema::*;
    use chrono::{Duration, TimeZone, Utc};

    fn message_at(user_id: i64, offset_us: i64, role: Role, content: &str) -> ConversationMessage {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let instant = base + Duration::microseconds(offset_us);
        ConversationMessage::new(user_id, &instant, role, content, Vec::new())
    }

    #[tokio::test]
    async fn test_recent_messages_are_most_recent_first_and_limited() {
        let db = WellnessDatabase::new_in_memory().unwrap();
        for i in 0..5 {
            db.conversations
                .put_message(&message_at(1, i * 10, Role::User, &format!("m{}", i)))
                .await
                .unwrap();
        }

        let recent = db.conversations.recent_messages(1, 3).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m3", "m2"]);
    }

    #[tokio::test]
    async fn test_all_messages_are_scoped_to_user_and_chronological() {
        let db = WellnessDatabase::new_in_memory().unwrap();
        db.conversations.put_message(&message_at(1, 20, Role::Assistant, "b")).await.unwrap();
        db.conversations.put_message(&message_at(1, 0, Role::User, "a")).await.unwrap();
        db.conversations.put_message(&message_at(2, 10, Role::User, "other")).await.unwrap();

        let all = db.conversations.all_messages(1).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "a");
        assert_eq!(all[1].content, "b");
        assert_eq!(all[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_keywords_round_trip() {
        let db = WellnessDatabase::new_in_memory().unwrap();
        let mut message = message_at(3, 0, Role::User, "stress and sleep");
        message.keywords = vec!["sleep".to_string(), "stress".to_string()];
        db.conversations.put_message(&message).await.unwrap();

        let stored = db.conversations.all_messages(3).await.unwrap();
        assert_eq!(stored, vec![message]);
    }

    #[tokio::test]
    async fn test_delete_message_by_exact_key() {
        let db = WellnessDatabase::new_in_memory().unwrap();
        let keep = message_at(1, 0, Role::User, "keep");
        let drop = message_at(1, 10, Role::User, "drop");
        db.conversations.put_message(&keep).await.unwrap();
        db.conversations.put_message(&drop).await.unwrap();

        db.conversations.delete_message(1, &drop.timestamp).await.unwrap();
        db.conversations.delete_message(1, "missing").await.unwrap();

        let remaining = db.conversations.all_messages(1).await.unwrap();
        assert_eq!(remaining, vec![keep]);
        assert_eq!(db.conversations.message_count(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_keywords_column_is_an_error() {
        let db = WellnessDatabase::new_in_memory().unwrap();
        let message = message_at(4, 0, Role::User, "hello");
        db.conversations.put_message(&message).await.unwrap();
        {
            let conn = db.conversations.get_conn().unwrap();
            conn.execute(
                "UPDATE wellness_conversation SET keywords = 'not json' WHERE user_id = 4",
                [],
            )
            .unwrap();
        }

        let err = db.conversations.all_messages(4).await.unwrap_err();
        assert!(format!("{:#}", err).contains("not valid JSON"));
    }

    #[tokio::test]
    async fn test_ping() {
        let db = WellnessDatabase::new_in_memory().unwrap();
        assert!(db.conversations.ping().await.is_ok());
    }
}
