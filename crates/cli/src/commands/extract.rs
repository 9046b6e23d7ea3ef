use serde::Serialize;
use wayfarer_agent::SlotExtractor;
use wayfarer_core::flows::{clarifying_questions, decide};
use wayfarer_core::IntentSlots;

#[derive(Debug, Serialize)]
struct ExtractReport {
    slots: IntentSlots,
    complete: bool,
    missing_fields: Vec<&'static str>,
    route: String,
    low_confidence: bool,
    questions: Vec<&'static str>,
}

/// Offline view of what one message contributes to a fresh session.
pub fn run(text: &str, json_output: bool) -> String {
    let slots = SlotExtractor::new().extract(text);
    let decision = decide(&slots);
    let missing_fields = slots.missing_fields();

    let report = ExtractReport {
        complete: slots.is_complete(),
        questions: clarifying_questions(&missing_fields),
        route: decision.route.label(),
        low_confidence: decision.low_confidence,
        missing_fields,
        slots,
    };

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!("{{\"error\":\"extract serialization failed: {error}\"}}")
        });
    }

    render_human(&report)
}

fn render_human(report: &ExtractReport) -> String {
    let slots = serde_json::to_string(&report.slots).unwrap_or_else(|_| "{}".to_string());
    let mut lines = vec![format!("slots: {slots}"), format!("route: {}", report.route)];
    if report.low_confidence {
        lines.push("note: destination not recognised, default destination used".to_string());
    }
    if report.complete {
        lines.push("complete: yes".to_string());
    } else {
        lines.push(format!("missing: {}", report.missing_fields.join(", ")));
        lines.extend(report.questions.iter().map(|question| format!("- {question}")));
    }
    lines.join("\n")
}
