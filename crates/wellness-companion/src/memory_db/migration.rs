//! Create-if-absent table provisioning

use rusqlite::{params, Connection, Result};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::memory_db::schema::{self, TableNames};

/// Tags recorded alongside every provisioned table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTags {
    pub application: String,
    pub environment: String,
    pub region: String,
}

impl Default for TableTags {
    fn default() -> Self {
        Self {
            application: "WellnessCompanion".to_string(),
            environment: "production".to_string(),
            region: "eu-north-1".to_string(),
        }
    }
}

/// Ensures the conversation and profile tables exist before the stores open
pub struct MigrationManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Create any missing table and register it with its tags.
    /// Tables that already exist are left untouched.
    pub fn provision_tables(&mut self, tables: &TableNames, tags: &TableTags) -> Result<Vec<String>> {
        self.conn.execute_batch(schema::REGISTRY_SQL)?;

        let existing = self.existing_tables()?;
        debug!("Existing tables: {:?}", existing);

        let wanted = [
            (tables.conversations.as_str(), schema::conversation_table_sql(&tables.conversations), "user_id HASH, timestamp RANGE"),
            (tables.profiles.as_str(), schema::profile_table_sql(&tables.profiles), "user_id HASH"),
        ];

        let mut created = Vec::new();
        for (name, create_sql, key_schema) in wanted.iter() {
            if existing.contains(*name) {
                info!("Table {} already exists", name);
                continue;
            }

            info!("Creating table {}...", name);
            let tx = self.conn.transaction()?;
            tx.execute_batch(create_sql)?;
            tx.execute(
                "INSERT OR REPLACE INTO provisioned_tables
                 (table_name, key_schema, application, environment, region, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    *name,
                    *key_schema,
                    &tags.application,
                    &tags.environment,
                    &tags.region,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )?;
            tx.commit()?;
            info!("Table {} created", name);
            created.push(name.to_string());
        }

        Ok(created)
    }

    fn existing_tables(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<String>>>()?;
        Ok(names)
    }

    /// Tags recorded for one table, if it was provisioned here
    pub fn table_tags(&self, table: &str) -> Result<Option<TableTags>> {
        use rusqlite::OptionalExtension;
        self.conn
            .query_row(
                "SELECT application, environment, region FROM provisioned_tables WHERE table_name = ?1",
                [table],
                |row| {
                    Ok(TableTags {
                        application: row.get(0)?,
                        environment: row.get(1)?,
                        region: row.get(2)?,
                    })
                },
            )
            .optional()
    }
}

/// Row counts and file size; safe on a busy connection since it only reads
pub fn get_database_stats(conn: &Connection, tables: &TableNames) -> Result<schema::DatabaseStats> {
    fn get_table_count(conn: &Connection, table_name: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table_name), [], |row| row.get(0))
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to get count from table {}: {}", table_name, e);
                0
            })
    }

    let database_size_bytes: i64 = conn
        .query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(schema::DatabaseStats {
        total_messages: get_table_count(conn, &tables.conversations),
        total_profiles: get_table_count(conn, &tables.profiles),
        database_size_bytes,
    })
}
