//! Shared state handed to every workflow and HTTP handler
//!
//! Nothing here is a process-wide global: `main` builds one `ServiceContext`
//! from configuration and tests build their own around in-memory stores and
//! stub inference.

use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    inference::{InferenceGateway, LlmClient},
    memory_db::{ConversationRepository, PoolSettings, ProfileRepository, TableTags, WellnessDatabase},
    rate_limit::FixedWindowLimiter,
};

/// Store and inference handles used by the workflows
#[derive(Clone)]
pub struct ServiceContext {
    pub conversations: Arc<dyn ConversationRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub inference: Arc<dyn InferenceGateway>,
}

impl ServiceContext {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        profiles: Arc<dyn ProfileRepository>,
        inference: Arc<dyn InferenceGateway>,
    ) -> Self {
        Self { conversations, profiles, inference }
    }

    /// Open the configured database and inference client
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = PoolSettings {
            max_size: config.db_pool_size,
            max_lifetime: config.db_pool_max_lifetime,
            idle_timeout: config.db_pool_idle_timeout,
        };
        let tags = TableTags {
            environment: config.environment.clone(),
            region: config.store_region.clone(),
            ..TableTags::default()
        };
        let database = WellnessDatabase::new(&config.database_path, &config.tables, &settings, &tags)?;
        let stats = database.get_stats()?;
        info!(
            "Database ready: {} messages, {} profiles, {} bytes",
            stats.total_messages, stats.total_profiles, stats.database_size_bytes
        );

        let inference = LlmClient::new(
            config.inference_base_url.clone(),
            config.inference_api_key.clone(),
            config.inference_model.clone(),
            config.inference_timeout,
        );

        info!("Service context initialized");
        Ok(Self::from_database(database, Arc::new(inference)))
    }

    pub fn from_database(database: WellnessDatabase, inference: Arc<dyn InferenceGateway>) -> Self {
        Self {
            conversations: Arc::new(database.conversations),
            profiles: Arc::new(database.profiles),
            inference,
        }
    }
}

/// Axum router state
#[derive(Clone)]
pub struct AppState {
    pub ctx: ServiceContext,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(ctx: ServiceContext, config: Arc<Config>) -> Self {
        let rate_limiter = Arc::new(FixedWindowLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window,
        ));
        Self { ctx, config, rate_limiter }
    }
}
