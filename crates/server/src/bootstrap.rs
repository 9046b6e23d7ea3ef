use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use wayfarer_agent::{
    AgentRuntime, BusError, FlowBus, FlowEventEmitter, FlowSubscriber, InMemoryFlowBus,
    LinkValidator, LlmError, ReasoningClient,
};
use wayfarer_core::config::{AppConfig, ConfigError, EventBackend, EventsConfig};
use wayfarer_core::{UnmeteredUsage, UsageGate};
use wayfarer_db::{connect_with_settings, migrations, DbPool, SessionSlotRepository, SqlSessionSlotRepository};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
    pub subscriber: FlowSubscriber,
    pub slots: Arc<dyn SessionSlotRepository>,
    pub usage: Arc<dyn UsageGate>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("reasoning client setup failed: {0}")]
    Reasoning(#[from] LlmError),
    #[error("link validator setup failed: {0}")]
    LinkValidator(String),
    #[error("event bus setup failed: {0}")]
    EventBus(#[from] BusError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let bus = event_bus(&config.events)?;
    info!(
        event_name = "system.bootstrap.event_bus_ready",
        correlation_id = "bootstrap",
        backend = ?config.events.backend,
        "flow event bus ready"
    );

    let reasoning = ReasoningClient::from_config(&config.llm)?;
    let emitter = FlowEventEmitter::new(bus.clone(), config.events.channel_prefix.clone());
    let mut runtime = AgentRuntime::new(Arc::new(reasoning), config.llm.candidate_models(), emitter);
    if config.links.enabled {
        let validator = LinkValidator::from_config(&config.links)
            .map_err(|error| BootstrapError::LinkValidator(error.to_string()))?;
        runtime = runtime.with_link_validator(validator);
    }

    Ok(Application {
        subscriber: FlowSubscriber::from_config(bus, &config.events),
        slots: Arc::new(SqlSessionSlotRepository::new(db_pool.clone())),
        usage: Arc::new(UnmeteredUsage),
        runtime: Arc::new(runtime),
        db_pool,
        config,
    })
}

fn event_bus(config: &EventsConfig) -> Result<Arc<dyn FlowBus>, BusError> {
    match config.backend {
        EventBackend::Memory => Ok(Arc::new(InMemoryFlowBus::default())),
        EventBackend::Redis => redis_bus(config),
    }
}

#[cfg(feature = "redis")]
fn redis_bus(config: &EventsConfig) -> Result<Arc<dyn FlowBus>, BusError> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| BusError::Unavailable("events.redis_url is not set".to_string()))?;
    Ok(Arc::new(wayfarer_agent::RedisFlowBus::new(url)?))
}

#[cfg(not(feature = "redis"))]
fn redis_bus(_config: &EventsConfig) -> Result<Arc<dyn FlowBus>, BusError> {
    Err(BusError::Unavailable(
        "redis backend requested but wayfarer-server was built without the `redis` feature"
            .to_string(),
    ))
}
