//! Memory database module - SQLite-backed conversation log and profile documents
pub mod schema;
pub mod migration;
pub mod repository;
pub mod conversation_store;
pub mod profile_store;
pub use schema::*;
pub use migration::{MigrationManager, TableTags};
pub use repository::{ConversationRepository, ProfileRepository};
pub use conversation_store::ConversationStore;
pub use profile_store::ProfileStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

/// Connection pool policy
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_size: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_lifetime: Duration::from_secs(1800),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

pub struct WellnessDatabase {
    pub conversations: ConversationStore,
    pub profiles: ProfileStore,
    tables: TableNames,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl WellnessDatabase {
    /// Open (or create) the database file and provision both tables
    pub fn new(
        db_path: &Path,
        tables: &TableNames,
        settings: &PoolSettings,
        tags: &TableTags,
    ) -> anyhow::Result<Self> {
        info!("Opening wellness database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA synchronous = NORMAL;"));
        let pool = Pool::builder()
            .max_size(settings.max_size)
            .max_lifetime(Some(settings.max_lifetime))
            .idle_timeout(Some(settings.idle_timeout))
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            let mut migrator = MigrationManager::new(&mut conn);
            migrator.provision_tables(tables, tags)?;
        }

        info!("Wellness database initialized successfully");
        Ok(Self::from_pool(Arc::new(pool), tables))
    }

    /// Private in-memory database. A single connection that never expires,
    /// since every SQLite memory connection is its own database.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let tables = TableNames::default();
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).provision_tables(&tables, &TableTags::default())?;
        }
        Ok(Self::from_pool(Arc::new(pool), &tables))
    }

    fn from_pool(pool: Arc<Pool<SqliteConnectionManager>>, tables: &TableNames) -> Self {
        Self {
            conversations: ConversationStore::new(Arc::clone(&pool), &tables.conversations),
            profiles: ProfileStore::new(Arc::clone(&pool), &tables.profiles),
            tables: tables.clone(),
            pool,
        }
    }

    pub fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        let conn = self.pool.get()?;
        Ok(migration::get_database_stats(&conn, &self.tables)?)
    }
}
