use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use toml::Value;
use wayfarer_core::config::{
    resolve_config_path, tool_server_env_key, AppConfig, LoadOptions, ENV_PREFIX,
};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    let api_key = match &config.llm.api_key {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };
    let fallback_model = config.llm.fallback_model.as_deref().unwrap_or("<unset>");
    let llm_fields = [
        ("llm.base_url", config.llm.base_url.clone()),
        ("llm.api_key", api_key),
        ("llm.primary_model", config.llm.primary_model.clone()),
        ("llm.fallback_model", fallback_model.to_string()),
        ("llm.temperature", config.llm.temperature.to_string()),
        ("llm.max_tokens", config.llm.max_tokens.to_string()),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
    ];
    for (key, value) in llm_fields {
        lines.push(render_line(key, &value, source(key, &[env_key(key).as_str()])));
    }

    lines.push(render_line(
        "tools.timeout_secs",
        &config.tools.timeout_secs.to_string(),
        source("tools.timeout_secs", &[env_key("tools.timeout_secs").as_str()]),
    ));
    for (server, url) in &config.tools.servers {
        let key = format!("tools.servers.{server}");
        lines.push(render_line(&key, url, source(&key, &[tool_server_env_key(server).as_str()])));
    }

    let redis_url = config.events.redis_url.as_deref().map(redact_url_credentials);
    let event_fields = [
        ("events.backend", format!("{:?}", config.events.backend).to_lowercase()),
        ("events.redis_url", redis_url.unwrap_or_else(|| "<unset>".to_string())),
        ("events.channel_prefix", config.events.channel_prefix.clone()),
        ("events.subscribe_timeout_secs", config.events.subscribe_timeout_secs.to_string()),
        ("events.poll_interval_ms", config.events.poll_interval_ms.to_string()),
        ("links.enabled", config.links.enabled.to_string()),
        ("links.timeout_secs", config.links.timeout_secs.to_string()),
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
    ];
    for (key, value) in event_fields {
        lines.push(render_line(key, &value, source(key, &[env_key(key).as_str()])));
    }

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["WAYFARER_LOGGING_LEVEL", "WAYFARER_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        source("logging.format", &["WAYFARER_LOGGING_FORMAT", "WAYFARER_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn env_key(key_path: &str) -> String {
    format!("{ENV_PREFIX}{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short vendor prefix such as `sk-or-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.rsplit_once('-') {
        Some((prefix, _)) if prefix.len() <= 8 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}

fn redact_url_credentials(url: &str) -> String {
    match (url.split_once("://"), url.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{scheme}://***@{host}"),
        _ => url.to_string(),
    }
}
