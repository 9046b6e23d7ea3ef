use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use wayfarer_agent::{
    AgentRuntime, FlowEventEmitter, FlowSubscriber, InMemoryFlowBus, LinkValidator,
    ReasoningClient, SubscriptionItem, ToolCall, ToolCallPhase, ToolClient, FALLBACK_REPLY,
};
use wayfarer_core::config::AppConfig;
use wayfarer_core::flows::Route;
use wayfarer_core::{Destination, IntentSlots, SessionId};

async fn serve(app: Router) -> String {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) => panic!("bind stub: {error}"),
    };
    let address = match listener.local_addr() {
        Ok(address) => address,
        Err(error) => panic!("stub address: {error}"),
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{address}")
}

async fn reasoning_stub(reply: &'static str) -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(move |Json(body): Json<Value>| async move {
            if body["model"] == "broken" {
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "down"})));
            }
            (StatusCode::OK, Json(json!({"choices": [{"message": {"content": reply}}]})))
        }),
    );
    serve(app).await
}

async fn failing_reasoning_stub() -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable") }),
    );
    serve(app).await
}

fn build_runtime(base_url: &str, bus: &InMemoryFlowBus) -> AgentRuntime {
    let mut config = AppConfig::default();
    config.llm.base_url = base_url.to_string();
    config.llm.timeout_secs = 5;

    let client = match ReasoningClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => panic!("reasoning client: {error}"),
    };
    let emitter = FlowEventEmitter::new(Arc::new(bus.clone()), "flow");
    AgentRuntime::new(Arc::new(client), config.llm.candidate_models(), emitter)
}

#[tokio::test]
async fn scenario_a_english_request_is_complete_and_routes_to_japan() {
    let base_url = reasoning_stub("## Your Japan trip\nDay 1: Tokyo").await;
    let runtime = build_runtime(&base_url, &InMemoryFlowBus::default());

    let outcome = runtime
        .process_turn(
            &SessionId::from("scenario-a"),
            "I want to go to Japan for 5 days with 2 people",
            &IntentSlots::default(),
            "en",
        )
        .await;

    assert_eq!(outcome.slots.destination.as_deref(), Some("japan"));
    assert_eq!(outcome.slots.duration_days, Some(5));
    assert_eq!(outcome.slots.num_travelers, Some(2));
    assert!(outcome.slots.is_complete());
    assert_eq!(outcome.decision.route, Route::Plan(Destination::Japan));
    assert!(!outcome.decision.low_confidence);
    assert_eq!(outcome.reply, "## Your Japan trip\nDay 1: Tokyo");
}

#[tokio::test]
async fn scenario_b_chinese_request_routes_to_taiwan() {
    let base_url = reasoning_stub("好的！").await;
    let runtime = build_runtime(&base_url, &InMemoryFlowBus::default());

    let outcome = runtime
        .process_turn(&SessionId::from("scenario-b"), "台灣5天2人", &IntentSlots::default(), "zh-TW")
        .await;

    assert_eq!(outcome.slots.destination.as_deref(), Some("taiwan"));
    assert_eq!(outcome.slots.duration_days, Some(5));
    assert_eq!(outcome.slots.num_travelers, Some(2));
    assert_eq!(outcome.decision.route.label(), "plan_taiwan");
}

#[tokio::test]
async fn scenario_c_ambiguous_first_message_asks_for_everything() {
    let base_url =
        reasoning_stub("Where would you like to go?\nSLOTS_JSON: {\"notes\":\"none\"}").await;
    let runtime = build_runtime(&base_url, &InMemoryFlowBus::default());

    let outcome = runtime
        .process_turn(&SessionId::from("scenario-c"), "hi!", &IntentSlots::default(), "en")
        .await;

    assert!(!outcome.slots.is_complete());
    assert_eq!(
        outcome.slots.missing_fields(),
        vec!["destination", "travel dates or duration", "number of travelers"]
    );
    assert_eq!(outcome.decision.route, Route::AskUser);
    assert_eq!(outcome.reply, "Where would you like to go?");
}

#[tokio::test]
async fn scenario_d_all_models_failing_returns_apology_and_prior_slots() {
    let base_url = failing_reasoning_stub().await;
    let runtime = build_runtime(&base_url, &InMemoryFlowBus::default());
    let prior = IntentSlots {
        destination: Some("japan".to_string()),
        budget_usd: Some(3000.0),
        ..IntentSlots::default()
    };

    let outcome =
        runtime.process_turn(&SessionId::from("scenario-d"), "thanks", &prior, "en").await;

    assert_eq!(outcome.reply, FALLBACK_REPLY);
    assert_eq!(outcome.slots, prior);
    assert!(outcome.model.is_none());
}

#[tokio::test]
async fn primary_failure_falls_through_to_fallback_model() {
    let base_url = reasoning_stub("fallback answered").await;
    let mut config = AppConfig::default();
    config.llm.base_url = base_url;
    config.llm.primary_model = "broken".to_string();
    config.llm.fallback_model = Some("steady".to_string());

    let client = match ReasoningClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => panic!("reasoning client: {error}"),
    };
    let emitter = FlowEventEmitter::new(Arc::new(InMemoryFlowBus::default()), "flow");
    let runtime = AgentRuntime::new(Arc::new(client), config.llm.candidate_models(), emitter);

    let outcome =
        runtime.process_turn(&SessionId::from("fallback"), "hello", &IntentSlots::default(), "en").await;
    assert_eq!(outcome.model.as_deref(), Some("steady"));
    assert_eq!(outcome.reply, "fallback answered");
}

#[tokio::test]
async fn live_subscriber_sees_full_timeline_in_order() {
    let base_url = reasoning_stub("Plan ready\nSLOTS_JSON: {\"origin_city\":\"Taipei\"}").await;
    let bus = InMemoryFlowBus::default();
    let runtime = build_runtime(&base_url, &bus);
    let subscriber =
        FlowSubscriber::new(Arc::new(bus.clone()), "flow", Duration::from_secs(5), Duration::from_millis(50));
    let session = SessionId::from("timeline");

    let stream = match subscriber.subscribe(&session).await {
        Ok(stream) => stream,
        Err(error) => panic!("subscribe: {error}"),
    };
    let outcome = runtime
        .process_turn(&session, "Japan for 4 days, 3 people", &IntentSlots::default(), "en")
        .await;
    assert_eq!(outcome.slots.origin_city.as_deref(), Some("Taipei"));

    let events: Vec<Value> = stream
        .filter_map(|item| async move {
            match item {
                SubscriptionItem::Event(payload) => serde_json::from_str(&payload).ok(),
                SubscriptionItem::KeepAlive => None,
            }
        })
        .collect()
        .await;

    let timeline: Vec<(String, String)> = events
        .iter()
        .map(|event| {
            (
                event["step"].as_str().unwrap_or_default().to_string(),
                event["status"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let expected = [
        ("received", "active"),
        ("intent_parsing", "active"),
        ("intent_parsing", "done"),
        ("routing", "active"),
        ("routing", "done"),
        ("planning", "active"),
        ("planning", "done"),
        ("post_processing", "active"),
        ("post_processing", "done"),
        ("synthesizing", "done"),
        ("complete", "done"),
    ];
    let expected: Vec<(String, String)> =
        expected.iter().map(|(step, status)| (step.to_string(), status.to_string())).collect();
    assert_eq!(timeline, expected);

    assert_eq!(events[4]["message"], "Route: plan_japan");
    assert_eq!(events[5]["crew"], "japan");
    assert_eq!(events[7]["crew"], json!(["booking", "advisory"]));
    assert_eq!(events[10]["slots"]["origin_city"], "Taipei");
    assert_eq!(bus.channel_count(), 0);
}

#[tokio::test]
async fn link_validation_pair_precedes_synthesis_and_dead_links_are_unwrapped() {
    let base_url = reasoning_stub("See [the guide](http://127.0.0.1:9/gone) first.").await;
    let bus = InMemoryFlowBus::default();
    let mut config = AppConfig::default();
    config.links.timeout_secs = 2;
    let validator = match LinkValidator::from_config(&config.links) {
        Ok(validator) => validator,
        Err(error) => panic!("link validator: {error}"),
    };
    let runtime = build_runtime(&base_url, &bus).with_link_validator(validator);
    let subscriber =
        FlowSubscriber::new(Arc::new(bus.clone()), "flow", Duration::from_secs(5), Duration::from_millis(50));
    let session = SessionId::from("links");

    let stream = match subscriber.subscribe(&session).await {
        Ok(stream) => stream,
        Err(error) => panic!("subscribe: {error}"),
    };
    let outcome = runtime
        .process_turn(&session, "Japan for 4 days, 3 people", &IntentSlots::default(), "en")
        .await;
    assert_eq!(outcome.reply, "See the guide first.");

    let events: Vec<Value> = stream
        .filter_map(|item| async move {
            match item {
                SubscriptionItem::Event(payload) => serde_json::from_str(&payload).ok(),
                SubscriptionItem::KeepAlive => None,
            }
        })
        .collect()
        .await;
    let tail: Vec<(&str, &str)> = events
        .iter()
        .skip(8)
        .map(|event| {
            (event["step"].as_str().unwrap_or_default(), event["status"].as_str().unwrap_or_default())
        })
        .collect();

    assert_eq!(
        tail,
        vec![
            ("post_processing", "done"),
            ("link_validation", "active"),
            ("link_validation", "done"),
            ("synthesizing", "done"),
            ("complete", "done"),
        ]
    );
    assert_eq!(events[9]["crew"], "link_validator");
}

async fn tool_endpoint(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    match body["method"].as_str() {
        Some("initialize") => (
            [("mcp-session-id", "stub-session")],
            Json(json!({"jsonrpc": "2.0", "id": body["id"], "result": {"protocolVersion": "2025-03-26"}})),
        )
            .into_response(),
        Some("notifications/initialized") => StatusCode::ACCEPTED.into_response(),
        Some("tools/call") => {
            let session = headers.get("mcp-session-id").and_then(|value| value.to_str().ok());
            if session != Some("stub-session") {
                return StatusCode::BAD_REQUEST.into_response();
            }
            let text = json!({"tool": body["params"]["name"], "args": body["params"]["arguments"]});
            let frame = json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": {"content": [{"type": "text", "text": text.to_string()}]},
            });
            (
                [("content-type", "text/event-stream")],
                format!("event: message\ndata: {frame}\n\n"),
            )
                .into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

#[tokio::test]
async fn call_many_isolates_failures_and_keeps_order() {
    let base_url = serve(Router::new().route("/mcp", post(tool_endpoint))).await;
    let mut config = AppConfig::default().tools;
    config.timeout_secs = 3;
    let client = match ToolClient::from_config(&config) {
        Ok(client) => client,
        Err(error) => panic!("tool client: {error}"),
    };

    let results = client
        .call_many(vec![
            ToolCall::new(&base_url, "search_flights", json!({"from": "TPE"})),
            ToolCall::new("http://127.0.0.1:9", "search_hotels", json!({})),
            ToolCall::new(&base_url, "convert_currency", Value::Null),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Some(json!({"tool": "search_flights", "args": {"from": "TPE"}})));
    assert_eq!(results[1], None);
    assert_eq!(results[2], Some(json!({"tool": "convert_currency", "args": {}})));
}

#[tokio::test]
async fn unreachable_tool_server_returns_none_within_timeout() {
    let mut config = AppConfig::default().tools;
    config.timeout_secs = 1;
    let client = match ToolClient::from_config(&config) {
        Ok(client) => client,
        Err(error) => panic!("tool client: {error}"),
    };

    let started = tokio::time::Instant::now();
    let result = client.call_tool("http://10.255.255.1:81", "search", json!({})).await;
    assert!(result.is_none());
    assert!(started.elapsed() < Duration::from_secs(3));
}

async fn rejecting_handshake_endpoint(Json(body): Json<Value>) -> Response {
    match body["method"].as_str() {
        Some("initialize") => Json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "error": {"code": -32602, "message": "unsupported protocol version"},
        }))
        .into_response(),
        Some("notifications/initialized") => StatusCode::ACCEPTED.into_response(),
        Some("tools/call") => Json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": {"content": [{"type": "text", "text": "{\"ok\": 1}"}]},
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

#[tokio::test]
async fn handshake_error_fails_the_call_before_invoking() {
    let base_url = serve(Router::new().route("/mcp", post(rejecting_handshake_endpoint))).await;
    let mut config = AppConfig::default().tools;
    config.timeout_secs = 3;
    let client = match ToolClient::from_config(&config) {
        Ok(client) => client,
        Err(error) => panic!("tool client: {error}"),
    };

    assert!(client.call_tool(&base_url, "search", json!({})).await.is_none());

    let error = match client.try_call_tool(&base_url, "search", json!({})).await {
        Ok(value) => panic!("handshake error should fail the call, got {value}"),
        Err(error) => error,
    };
    assert_eq!(error.phase(), ToolCallPhase::Handshaking);
}
