//! Trailing `SLOTS_JSON:` annotation emitted by the reasoning model.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use wayfarer_core::IntentSlots;

pub const ANNOTATION_TAG: &str = "SLOTS_JSON:";

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedReply {
    /// Reply text with the annotation line removed.
    pub visible: String,
    pub slots: Option<IntentSlots>,
}

fn annotation_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(r"\n?SLOTS_JSON:\s*(\{[^\n]*\})\s*$") {
            Ok(regex) => Some(regex),
            Err(error) => {
                warn!(
                    event_name = "agent.annotation.pattern_invalid",
                    error = %error,
                    "annotation pattern failed to compile"
                );
                None
            }
        })
        .as_ref()
}

/// Splits a raw model reply into user-visible text and any declared slots.
///
/// The annotation line is always stripped once found, even when its JSON is
/// unusable. Slots are `None` when nothing known and non-null survives.
pub fn parse_slot_annotation(raw: &str) -> AnnotatedReply {
    let captures = annotation_pattern().and_then(|pattern| pattern.captures(raw));
    let Some(captures) = captures else {
        return AnnotatedReply { visible: raw.trim().to_string(), slots: None };
    };
    let (Some(whole), Some(json)) = (captures.get(0), captures.get(1)) else {
        return AnnotatedReply { visible: raw.trim().to_string(), slots: None };
    };

    let visible = raw[..whole.start()].trim().to_string();
    let slots = match serde_json::from_str::<Value>(json.as_str()) {
        Ok(Value::Object(object)) => {
            let slots = IntentSlots::from_json_object(&object);
            (!slots.is_empty()).then_some(slots)
        }
        Ok(_) => {
            debug!(event_name = "agent.annotation.not_object", "slot annotation is not an object");
            None
        }
        Err(error) => {
            debug!(
                event_name = "agent.annotation.malformed",
                error = %error,
                "slot annotation could not be decoded"
            );
            None
        }
    };

    AnnotatedReply { visible, slots }
}
