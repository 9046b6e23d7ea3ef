use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "wayfarer.toml";
pub const ENV_PREFIX: &str = "WAYFARER_";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub events: EventsConfig,
    pub links: LinksConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Ordered model candidates, primary first, without duplicates.
    pub fn candidate_models(&self) -> Vec<String> {
        let mut models = vec![self.primary_model.clone()];
        if let Some(fallback) = &self.fallback_model {
            if !fallback.trim().is_empty() && fallback != &self.primary_model {
                models.push(fallback.clone());
            }
        }
        models
    }
}

#[derive(Clone, Debug)]
pub struct ToolsConfig {
    pub timeout_secs: u64,
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    /// Tool server base URLs keyed by server name. The protocol path is
    /// appended by the client.
    pub servers: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct EventsConfig {
    pub backend: EventBackend,
    pub redis_url: Option<String>,
    pub channel_prefix: String,
    pub subscribe_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LinksConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Zero derives the limit from available parallelism.
    pub max_concurrency: usize,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventBackend {
    Memory,
    Redis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_primary_model: Option<String>,
    pub llm_fallback_model: Option<String>,
    pub events_backend: Option<EventBackend>,
    pub events_redis_url: Option<String>,
    pub links_enabled: Option<bool>,
    pub tool_servers: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub fn default_tool_servers() -> BTreeMap<String, String> {
    [
        ("japan", "http://localhost:8001"),
        ("taiwan", "http://localhost:8002"),
        ("flights", "http://localhost:8003"),
        ("utilities", "http://localhost:8004"),
        ("knowledge", "http://localhost:8005"),
    ]
    .into_iter()
    .map(|(key, url)| (key.to_string(), url.to_string()))
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                base_url: "https://openrouter.ai/api/v1".to_string(),
                api_key: None,
                primary_model: "arcee-ai/trinity-large-preview:free".to_string(),
                fallback_model: Some("arcee-ai/trinity-mini:free".to_string()),
                temperature: 0.7,
                max_tokens: 4000,
                timeout_secs: 120,
            },
            tools: ToolsConfig {
                timeout_secs: 15,
                protocol_version: "2025-03-26".to_string(),
                client_name: "wayfarer".to_string(),
                client_version: env!("CARGO_PKG_VERSION").to_string(),
                servers: default_tool_servers(),
            },
            events: EventsConfig {
                backend: EventBackend::Memory,
                redis_url: None,
                channel_prefix: "flow".to_string(),
                subscribe_timeout_secs: 120,
                poll_interval_ms: 1000,
            },
            links: LinksConfig { enabled: true, timeout_secs: 5, max_concurrency: 0 },
            database: DatabaseConfig {
                url: "sqlite://wayfarer.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8200 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for EventBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::Validation(format!(
                "unsupported events backend `{other}` (expected memory|redis)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
            tracing::debug!(
                event_name = "core.config.file_applied",
                path = %path.display(),
                "config file applied"
            );
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(primary_model) = llm.primary_model {
                self.llm.primary_model = primary_model;
            }
            if let Some(fallback_model) = llm.fallback_model {
                self.llm.fallback_model = Some(fallback_model);
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(tools) = patch.tools {
            if let Some(timeout_secs) = tools.timeout_secs {
                self.tools.timeout_secs = timeout_secs;
            }
            if let Some(protocol_version) = tools.protocol_version {
                self.tools.protocol_version = protocol_version;
            }
            if let Some(client_name) = tools.client_name {
                self.tools.client_name = client_name;
            }
            if let Some(servers) = tools.servers {
                self.tools.servers.extend(servers);
            }
        }

        if let Some(events) = patch.events {
            if let Some(backend) = events.backend {
                self.events.backend = backend;
            }
            if let Some(redis_url) = events.redis_url {
                self.events.redis_url = Some(redis_url);
            }
            if let Some(channel_prefix) = events.channel_prefix {
                self.events.channel_prefix = channel_prefix;
            }
            if let Some(subscribe_timeout_secs) = events.subscribe_timeout_secs {
                self.events.subscribe_timeout_secs = subscribe_timeout_secs;
            }
            if let Some(poll_interval_ms) = events.poll_interval_ms {
                self.events.poll_interval_ms = poll_interval_ms;
            }
        }

        if let Some(links) = patch.links {
            if let Some(enabled) = links.enabled {
                self.links.enabled = enabled;
            }
            if let Some(timeout_secs) = links.timeout_secs {
                self.links.timeout_secs = timeout_secs;
            }
            if let Some(max_concurrency) = links.max_concurrency {
                self.links.max_concurrency = max_concurrency;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WAYFARER_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("WAYFARER_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("WAYFARER_LLM_PRIMARY_MODEL") {
            self.llm.primary_model = value;
        }
        if let Some(value) = read_env("WAYFARER_LLM_FALLBACK_MODEL") {
            self.llm.fallback_model = Some(value);
        }
        if let Some(value) = read_env("WAYFARER_LLM_TEMPERATURE") {
            self.llm.temperature = parse_value("WAYFARER_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_value("WAYFARER_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("WAYFARER_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_TOOLS_TIMEOUT_SECS") {
            self.tools.timeout_secs = parse_value("WAYFARER_TOOLS_TIMEOUT_SECS", &value)?;
        }
        for (key, url) in self.tools.servers.iter_mut() {
            if let Some(value) = read_env(&tool_server_env_key(key)) {
                *url = value;
            }
        }

        if let Some(value) = read_env("WAYFARER_EVENTS_BACKEND") {
            self.events.backend = value.parse()?;
        }
        if let Some(value) = read_env("WAYFARER_EVENTS_REDIS_URL") {
            self.events.redis_url = Some(value);
        }
        if let Some(value) = read_env("WAYFARER_EVENTS_CHANNEL_PREFIX") {
            self.events.channel_prefix = value;
        }
        if let Some(value) = read_env("WAYFARER_EVENTS_SUBSCRIBE_TIMEOUT_SECS") {
            self.events.subscribe_timeout_secs =
                parse_value("WAYFARER_EVENTS_SUBSCRIBE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_EVENTS_POLL_INTERVAL_MS") {
            self.events.poll_interval_ms =
                parse_value("WAYFARER_EVENTS_POLL_INTERVAL_MS", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_LINKS_ENABLED") {
            self.links.enabled = parse_value("WAYFARER_LINKS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_LINKS_TIMEOUT_SECS") {
            self.links.timeout_secs = parse_value("WAYFARER_LINKS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("WAYFARER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_value("WAYFARER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_value("WAYFARER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("WAYFARER_SERVER_PORT") {
            self.server.port = parse_value("WAYFARER_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("WAYFARER_LOGGING_LEVEL").or_else(|| read_env("WAYFARER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WAYFARER_LOGGING_FORMAT").or_else(|| read_env("WAYFARER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(primary_model) = overrides.llm_primary_model {
            self.llm.primary_model = primary_model;
        }
        if let Some(fallback_model) = overrides.llm_fallback_model {
            self.llm.fallback_model = Some(fallback_model);
        }
        if let Some(backend) = overrides.events_backend {
            self.events.backend = backend;
        }
        if let Some(redis_url) = overrides.events_redis_url {
            self.events.redis_url = Some(redis_url);
        }
        if let Some(enabled) = overrides.links_enabled {
            self.links.enabled = enabled;
        }
        self.tools.servers.extend(overrides.tool_servers);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_tools(&self.tools)?;
        validate_events(&self.events)?;
        validate_links(&self.links)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn tool_server_env_key(server_key: &str) -> String {
    format!("{ENV_PREFIX}TOOLS_{}_URL", server_key.to_ascii_uppercase().replace('-', "_"))
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), Path::new("config").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with("http://") || trimmed.starts_with("https://")
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.primary_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.primary_model is required (for example `arcee-ai/trinity-large-preview:free`)"
                .to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if let Some(api_key) = &llm.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_key is set but empty; remove it or provide a key".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_tools(tools: &ToolsConfig) -> Result<(), ConfigError> {
    if tools.timeout_secs == 0 || tools.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "tools.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if tools.protocol_version.trim().is_empty() {
        return Err(ConfigError::Validation("tools.protocol_version is required".to_string()));
    }

    for (key, url) in &tools.servers {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(format!(
                "tools.servers.{key} must start with http:// or https://"
            )));
        }
    }

    Ok(())
}

fn validate_events(events: &EventsConfig) -> Result<(), ConfigError> {
    if events.channel_prefix.trim().is_empty() {
        return Err(ConfigError::Validation("events.channel_prefix is required".to_string()));
    }

    if events.subscribe_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "events.subscribe_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if events.poll_interval_ms == 0
        || events.poll_interval_ms > events.subscribe_timeout_secs.saturating_mul(1000)
    {
        return Err(ConfigError::Validation(
            "events.poll_interval_ms must be positive and shorter than the subscribe timeout"
                .to_string(),
        ));
    }

    if events.backend == EventBackend::Redis {
        let url = events.redis_url.as_deref().map(str::trim).unwrap_or_default();
        if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
            return Err(ConfigError::Validation(
                "events.redis_url must be a redis:// URL when events.backend = \"redis\""
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_links(links: &LinksConfig) -> Result<(), ConfigError> {
    if links.timeout_secs == 0 || links.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "links.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    tools: Option<ToolsPatch>,
    events: Option<EventsPatch>,
    links: Option<LinksPatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    primary_model: Option<String>,
    fallback_model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolsPatch {
    timeout_secs: Option<u64>,
    protocol_version: Option<String>,
    client_name: Option<String>,
    servers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct EventsPatch {
    backend: Option<EventBackend>,
    redis_url: Option<String>,
    channel_prefix: Option<String>,
    subscribe_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksPatch {
    enabled: Option<bool>,
    timeout_secs: Option<u64>,
    max_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
