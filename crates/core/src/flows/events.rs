use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::slots::IntentSlots;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Received,
    IntentParsing,
    Routing,
    Planning,
    PostProcessing,
    LinkValidation,
    Synthesizing,
    Complete,
    Error,
}

impl FlowStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::IntentParsing => "intent_parsing",
            Self::Routing => "routing",
            Self::Planning => "planning",
            Self::PostProcessing => "post_processing",
            Self::LinkValidation => "link_validation",
            Self::Synthesizing => "synthesizing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    pub fn is_terminal_name(step: &str) -> bool {
        step == Self::Complete.as_str() || step == Self::Error.as_str()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Active,
    Done,
    Error,
}

/// One crew name or several crews working the same step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrewLabel {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for CrewLabel {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<&[&str]> for CrewLabel {
    fn from(value: &[&str]) -> Self {
        Self::Many(value.iter().map(|crew| crew.to_string()).collect())
    }
}

/// Progress notification for live subscribers. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub step: FlowStep,
    pub crew: Option<CrewLabel>,
    pub status: FlowStatus,
    pub slots: Option<IntentSlots>,
    pub message: String,
    /// Unix seconds with millisecond precision.
    pub ts: f64,
}

impl FlowEvent {
    pub fn new(step: FlowStep, status: FlowStatus, message: impl Into<String>) -> Self {
        Self {
            step,
            crew: None,
            status,
            slots: None,
            message: message.into(),
            ts: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }

    pub fn with_crew(mut self, crew: impl Into<CrewLabel>) -> Self {
        self.crew = Some(crew.into());
        self
    }

    pub fn with_slots(mut self, slots: &IntentSlots) -> Self {
        self.slots = Some(slots.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{FlowEvent, FlowStatus, FlowStep};
    use crate::domain::slots::IntentSlots;

    #[test]
    fn event_serializes_with_wire_field_names() {
        let slots = IntentSlots { num_travelers: Some(2), ..IntentSlots::default() };
        let event = FlowEvent::new(FlowStep::PostProcessing, FlowStatus::Done, "Slots merged")
            .with_crew(["booking", "advisory"].as_slice())
            .with_slots(&slots);

        let value: Value = serde_json::to_value(&event).expect("serialize");

        assert_eq!(value["step"], "post_processing");
        assert_eq!(value["status"], "done");
        assert_eq!(value["crew"], serde_json::json!(["booking", "advisory"]));
        assert_eq!(value["slots"]["num_travelers"], 2);
        assert_eq!(value["message"], "Slots merged");
        assert!(value["ts"].as_f64().is_some());
    }

    #[test]
    fn missing_crew_serializes_as_null() {
        let event = FlowEvent::new(FlowStep::Received, FlowStatus::Active, "Message received");
        let value: Value = serde_json::to_value(&event).expect("serialize");

        assert!(value["crew"].is_null());
        assert!(value["slots"].is_null());
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(FlowStep::Complete.is_terminal());
        assert!(FlowStep::Error.is_terminal());
        assert!(!FlowStep::Synthesizing.is_terminal());
        assert!(FlowStep::is_terminal_name("error"));
        assert!(!FlowStep::is_terminal_name("routing"));
    }
}
