use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weather_agent_relay::{
    api::start_server,
    model::{ChatModel, OpenAiModel},
    AgentFactory, Config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing; RUST_LOG overrides the DEBUG-derived level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.debug {
        info!("🔧 Running in DEBUG mode with verbose logging");
    } else {
        info!("🚀 Running in PRODUCTION mode");
    }

    if config.openai_api_key.is_empty() {
        warn!("⚠️  OPENAI_API_KEY not set; agent runs will report a model error");
    }

    let model: Arc<dyn ChatModel> = Arc::new(OpenAiModel::new(&config)?);
    info!("📍 Model: {}", model.model_id());
    info!("📍 Port: {}", config.port);

    let factory = Arc::new(AgentFactory::new(model, &config));

    info!("📡 Starting API server...");
    start_server(factory, config).await?;

    Ok(())
}
