use serde_json::Value;
use wayfarer_agent::ToolClient;
use wayfarer_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

pub fn run(server: &str, tool: &str, raw_args: Option<&str>) -> CommandResult {
    let arguments = match raw_args.map(serde_json::from_str::<Value>).transpose() {
        Ok(Some(value @ Value::Object(_))) => value,
        Ok(None) => Value::Object(Default::default()),
        Ok(Some(_)) => {
            return CommandResult::failure(
                "tool",
                "invalid_arguments",
                "--args must be a JSON object",
                2,
            );
        }
        Err(error) => {
            return CommandResult::failure(
                "tool",
                "invalid_arguments",
                format!("--args is not valid JSON: {error}"),
                2,
            );
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "tool",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let client = match ToolClient::from_config(&config.tools) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "tool",
                "client_init",
                format!("failed to build tool client: {error}"),
                3,
            );
        }
    };

    let Some(endpoint) = client.server_url(server).map(str::to_string) else {
        let known = client.server_keys().collect::<Vec<_>>().join(", ");
        return CommandResult::failure(
            "tool",
            "unknown_server",
            format!("no tool server `{server}` (known: {known})"),
            2,
        );
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "tool",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(client.try_call_tool(&endpoint, tool, arguments)) {
        Ok(result) => CommandResult::success("tool", result.to_string()),
        Err(error) => CommandResult::failure(
            "tool",
            "tool_call",
            format!("`{tool}` on `{server}` ({endpoint}) failed at {error}"),
            4,
        ),
    }
}
