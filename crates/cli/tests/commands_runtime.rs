use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use wayfarer_cli::commands::{config, doctor, extract, migrate, tool};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("WAYFARER_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().contains("latest version 1"));
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("WAYFARER_DATABASE_URL", "postgres://localhost/wayfarer")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_reports_each_check_and_warns_without_api_key() {
    with_env(&[("WAYFARER_DATABASE_URL", "sqlite::memory:")], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "pass");

        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let names: Vec<&str> = checks.iter().filter_map(|check| check["name"].as_str()).collect();
        assert_eq!(
            names,
            vec![
                "config_validation",
                "reasoning_credentials",
                "tool_servers",
                "event_backend",
                "database_connectivity",
            ]
        );
        assert_eq!(checks[1]["status"], "warn");
        assert!(checks[2]["details"].as_str().unwrap_or_default().contains("flights="));
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("WAYFARER_LLM_TIMEOUT_SECS", "not-a-number")], || {
        let output = doctor::run(false);
        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] config_validation"));
        assert!(output.contains("- [skip] database_connectivity"));
    });
}

#[test]
fn config_redacts_api_key_and_attributes_env_source() {
    with_env(
        &[
            ("WAYFARER_LLM_API_KEY", "sk-or-v1-topsecretvalue"),
            ("WAYFARER_TOOLS_FLIGHTS_URL", "http://flights.internal:9000"),
        ],
        || {
            let output = config::run();
            assert!(!output.contains("topsecretvalue"));
            assert!(output.contains("- llm.api_key = sk-or-v1-*** (source: env (WAYFARER_LLM_API_KEY))"));
            assert!(output.contains(
                "- tools.servers.flights = http://flights.internal:9000 (source: env (WAYFARER_TOOLS_FLIGHTS_URL))"
            ));
            assert!(output.contains("- events.backend = memory (source: default)"));
        },
    );
}

#[test]
fn extract_json_reports_slots_route_and_questions() {
    let payload = parse_payload(&extract::run("Taiwan trip, 3 adults, budget $2,000", true));

    assert_eq!(payload["slots"]["destination"], "taiwan");
    assert_eq!(payload["slots"]["num_travelers"], 3);
    assert_eq!(payload["slots"]["budget_usd"], 2000.0);
    assert_eq!(payload["complete"], false);
    assert_eq!(payload["route"], "ask_user");
    assert_eq!(payload["missing_fields"], serde_json::json!(["travel dates or duration"]));
    assert_eq!(
        payload["questions"],
        serde_json::json!(["When are you planning to travel, and for how many days?"])
    );
}

#[test]
fn extract_human_output_marks_complete_requests() {
    let output = extract::run("Japan for 5 days with 2 people", false);
    assert!(output.contains("route: plan_japan"));
    assert!(output.contains("complete: yes"));
}

#[test]
fn tool_rejects_non_object_arguments() {
    let result = tool::run("flights", "search_flights", Some("[1, 2]"));
    assert_eq!(result.exit_code, 2);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "tool");
    assert_eq!(payload["error_class"], "invalid_arguments");
}

#[test]
fn tool_reports_unknown_server_with_known_keys() {
    with_env(&[], || {
        let result = tool::run("mars", "search", None);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unknown_server");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("japan"), "unexpected message: {message}");
    });
}

#[test]
fn tool_reports_failing_phase_for_unreachable_server() {
    with_env(
        &[("WAYFARER_TOOLS_UTILITIES_URL", "http://127.0.0.1:9"), ("WAYFARER_TOOLS_TIMEOUT_SECS", "2")],
        || {
            let result = tool::run("utilities", "convert_currency", Some(r#"{"amount": 10}"#));
            assert_eq!(result.exit_code, 4);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "tool_call");
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.contains("handshaking"), "unexpected message: {message}");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "WAYFARER_DATABASE_URL",
        "WAYFARER_DATABASE_MAX_CONNECTIONS",
        "WAYFARER_DATABASE_TIMEOUT_SECS",
        "WAYFARER_LLM_BASE_URL",
        "WAYFARER_LLM_API_KEY",
        "WAYFARER_LLM_PRIMARY_MODEL",
        "WAYFARER_LLM_FALLBACK_MODEL",
        "WAYFARER_LLM_TIMEOUT_SECS",
        "WAYFARER_TOOLS_TIMEOUT_SECS",
        "WAYFARER_TOOLS_FLIGHTS_URL",
        "WAYFARER_TOOLS_UTILITIES_URL",
        "WAYFARER_EVENTS_BACKEND",
        "WAYFARER_EVENTS_REDIS_URL",
        "WAYFARER_LINKS_ENABLED",
        "WAYFARER_SERVER_BIND_ADDRESS",
        "WAYFARER_SERVER_PORT",
        "WAYFARER_LOGGING_LEVEL",
        "WAYFARER_LOGGING_FORMAT",
        "WAYFARER_LOG_LEVEL",
        "WAYFARER_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
