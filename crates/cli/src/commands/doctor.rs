use serde::Serialize;
use wayfarer_core::config::{AppConfig, EventBackend, LoadOptions};
use wayfarer_db::connect_with_settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["reasoning_credentials", "tool_servers", "event_backend", "database_connectivity"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_reasoning_credentials(&config));
            checks.push(check_tool_servers(&config));
            checks.push(check_event_backend(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in DEPENDENT_CHECKS {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_reasoning_credentials(config: &AppConfig) -> DoctorCheck {
    let models = config.llm.candidate_models().join(" -> ");
    match config.llm.api_key {
        Some(_) => DoctorCheck {
            name: "reasoning_credentials",
            status: CheckStatus::Pass,
            details: format!("api key set for `{}`; models {models}", config.llm.base_url),
        },
        None => DoctorCheck {
            name: "reasoning_credentials",
            status: CheckStatus::Warn,
            details: format!(
                "no api key; requests to `{}` are sent unauthenticated (set WAYFARER_LLM_API_KEY)",
                config.llm.base_url
            ),
        },
    }
}

fn check_tool_servers(config: &AppConfig) -> DoctorCheck {
    if config.tools.servers.is_empty() {
        return DoctorCheck {
            name: "tool_servers",
            status: CheckStatus::Warn,
            details: "no tool servers registered".to_string(),
        };
    }

    let registry = config
        .tools
        .servers
        .iter()
        .map(|(key, url)| format!("{key}={url}"))
        .collect::<Vec<_>>()
        .join(", ");
    DoctorCheck { name: "tool_servers", status: CheckStatus::Pass, details: registry }
}

fn check_event_backend(config: &AppConfig) -> DoctorCheck {
    match config.events.backend {
        EventBackend::Memory => DoctorCheck {
            name: "event_backend",
            status: CheckStatus::Pass,
            details: "in-process bus; subscribers must share the server process".to_string(),
        },
        EventBackend::Redis => DoctorCheck {
            name: "event_backend",
            status: CheckStatus::Pass,
            details: "redis pub/sub; the server must be built with the `redis` feature"
                .to_string(),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
