use tracing::{info, warn};
use wellness_companion::{config::Config, run_server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_loaded = Config::load_dotenv();

    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "production".into());
    telemetry::init_tracing(Config::default_log_filter(&environment));

    if dotenv_loaded {
        info!("Loaded environment variables from .env file");
    } else {
        warn!("No .env file found. Using system environment variables.");
    }

    let cfg = Config::from_env()?;
    info!("Starting AI Wellness Companion API ({})", cfg.environment);
    run_server(cfg).await
}
