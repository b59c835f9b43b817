//! Record types and table definitions for the conversation and profile stores
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Speaker of a stored conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Display label used when rendering transcripts
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow::anyhow!("Unknown message role: {}", other)),
        }
    }
}

/// Fixed-width RFC3339 instant; string order equals chronological order.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Build the sort key `<instant>#<role>#<uuid>` for one message row.
pub fn composite_key(instant: &DateTime<Utc>, role: Role) -> String {
    format!("{}#{}#{}", format_instant(instant), role, Uuid::new_v4())
}

/// One row of a user's append-only message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub user_id: i64,
    pub timestamp: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ConversationMessage {
    pub fn new(
        user_id: i64,
        instant: &DateTime<Utc>,
        role: Role,
        content: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            user_id,
            timestamp: composite_key(instant, role),
            role,
            content: content.into(),
            keywords,
        }
    }
}

/// Keyword trail entry appended to a profile after a chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Digest produced when a user's history is cleared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default = "default_sentiment")]
    pub sentiment: String,
    #[serde(default)]
    pub insights: String,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub date_range: DateRange,
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

pub const DEFAULT_BACKGROUND: &str = "Other";

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

/// Per-user profile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default)]
    pub preferences: Map<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub summaries: Vec<ConversationSummary>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl UserProfile {
    /// In-memory profile used when none has been stored yet
    pub fn with_defaults(user_id: i64) -> Self {
        Self {
            user_id,
            age: None,
            background: default_background(),
            preferences: Map::new(),
            history: Vec::new(),
            summaries: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Row counts reported by the store
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub total_messages: i64,
    pub total_profiles: i64,
    pub database_size_bytes: i64,
}

/// Names of the two tables, validated as SQL identifiers before use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub conversations: String,
    pub profiles: String,
}

impl TableNames {
    pub fn new(conversations: impl Into<String>, profiles: impl Into<String>) -> anyhow::Result<Self> {
        let names = Self {
            conversations: conversations.into(),
            profiles: profiles.into(),
        };
        validate_identifier(&names.conversations)?;
        validate_identifier(&names.profiles)?;
        if names.conversations == names.profiles {
            return Err(anyhow::anyhow!(
                "Conversation and profile tables must differ (both '{}')",
                names.conversations
            ));
        }
        Ok(names)
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            conversations: "wellness_conversation".to_string(),
            profiles: "wellness_profile".to_string(),
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> anyhow::Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Invalid table name: '{}'", name))
    }
}

pub fn conversation_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            user_id INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            keywords TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (user_id, timestamp)
        ) WITHOUT ROWID;"
    )
}

pub fn profile_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            user_id INTEGER PRIMARY KEY,
            document TEXT NOT NULL
        );"
    )
}

pub const REGISTRY_SQL: &str = "
CREATE TABLE IF NOT EXISTS provisioned_tables (
    table_name TEXT PRIMARY KEY,
    key_schema TEXT NOT NULL,
    application TEXT NOT NULL,
    environment TEXT NOT NULL,
    region TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";
