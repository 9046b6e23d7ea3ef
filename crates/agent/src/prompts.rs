//! System and user prompt construction for the reasoning model.

use tera::{Context, Tera};
use tracing::warn;
use wayfarer_core::IntentSlots;

pub const GREETING_TEMPLATE: &str = "greeting.txt";
pub const CONVERSATION_TEMPLATE: &str = "conversation.txt";

/// Used when the template catalog cannot render.
const FALLBACK_SYSTEM_PROMPT: &str = "You are a professional travel planning assistant \
specializing in Japan and Taiwan trips. Respond in the same language as the user. If the \
destination, travel dates or duration, or number of travelers is missing, ask for it. Otherwise \
create a detailed day-by-day itinerary. After your response append exactly one line: \
SLOTS_JSON: {\"destination\":\"...\",\"duration_days\":...,\"num_travelers\":...}";

pub fn locale_display_name(locale: &str) -> &str {
    match locale {
        "en" => "English",
        "zh" | "zh-TW" => "Traditional Chinese (繁體中文)",
        "ja" => "Japanese",
        other => other,
    }
}

pub struct PromptCatalog {
    tera: Tera,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptCatalog {
    pub fn new() -> Self {
        let mut tera = Tera::default();
        let templates = vec![
            ("shared_rules.txt", include_str!("../../../templates/prompts/shared_rules.txt")),
            ("planning_rules.txt", include_str!("../../../templates/prompts/planning_rules.txt")),
            (GREETING_TEMPLATE, include_str!("../../../templates/prompts/greeting.txt")),
            (CONVERSATION_TEMPLATE, include_str!("../../../templates/prompts/conversation.txt")),
        ];
        if let Err(error) = tera.add_raw_templates(templates) {
            warn!(
                event_name = "agent.prompts.load_failed",
                error = %error,
                "prompt templates failed to load; using built-in fallback"
            );
        }
        Self { tera }
    }

    /// Greeting variant on a session's first turn, same-language variant after.
    pub fn system_prompt(&self, first_turn: bool, locale: &str) -> String {
        let (template, context) = if first_turn {
            let mut context = Context::new();
            context.insert("locale", locale_display_name(locale));
            (GREETING_TEMPLATE, context)
        } else {
            (CONVERSATION_TEMPLATE, Context::new())
        };

        match self.tera.render(template, &context) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(
                    event_name = "agent.prompts.render_failed",
                    template,
                    error = %error,
                    "prompt render failed; using built-in fallback"
                );
                FALLBACK_SYSTEM_PROMPT.to_string()
            }
        }
    }
}

/// User-role prompt carrying the accumulated slots and a completeness directive.
pub fn user_prompt(message: &str, slots: &IntentSlots) -> String {
    let mut parts = Vec::with_capacity(3);

    if slots.is_empty() {
        parts.push("[Accumulated travel info]: None yet, this is a new conversation.".to_string());
    } else {
        let encoded = serde_json::to_string(slots).unwrap_or_else(|_| "{}".to_string());
        parts.push(format!("[Accumulated travel info]: {encoded}"));
        if slots.is_complete() {
            parts.push(
                "[Status]: All required info collected. Generate a detailed itinerary now."
                    .to_string(),
            );
        } else {
            parts.push(format!("[Status]: Still need: {}", slots.missing_fields().join(", ")));
        }
    }

    parts.push(format!("\nUser message: {message}"));
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use wayfarer_core::IntentSlots;

    use super::{locale_display_name, user_prompt, PromptCatalog};

    #[test]
    fn greeting_prompt_names_locale() {
        let prompt = PromptCatalog::new().system_prompt(true, "zh-TW");
        assert!(prompt.contains("Greet the user in Traditional Chinese (繁體中文) language."));
        assert!(prompt.contains("SLOTS_JSON: {\"destination\""));
        assert!(prompt.contains("/packages/{slug}"));
    }

    #[test]
    fn conversation_prompt_follows_user_language() {
        let prompt = PromptCatalog::new().system_prompt(false, "ja");
        assert!(prompt.contains("Respond in the SAME LANGUAGE as the user."));
        assert!(!prompt.contains("Greet the user"));
        assert!(prompt.contains("day-by-day itinerary"));
    }

    #[test]
    fn unknown_locale_passes_through() {
        assert_eq!(locale_display_name("fr"), "fr");
        assert_eq!(locale_display_name("en"), "English");
    }

    #[test]
    fn new_conversation_prompt_has_no_status_line() {
        let prompt = user_prompt("hi", &IntentSlots::default());
        assert_eq!(
            prompt,
            "[Accumulated travel info]: None yet, this is a new conversation.\n\nUser message: hi"
        );
    }

    #[test]
    fn partial_slots_list_what_is_still_needed() {
        let slots = IntentSlots { destination: Some("japan".to_string()), ..IntentSlots::default() };
        let prompt = user_prompt("next week", &slots);
        assert!(prompt.starts_with("[Accumulated travel info]: {\"destination\":\"japan\"}"));
        assert!(prompt.contains("[Status]: Still need: travel dates or duration, number of travelers"));
        assert!(prompt.ends_with("User message: next week"));
    }

    #[test]
    fn complete_slots_request_itinerary() {
        let slots = IntentSlots {
            destination: Some("taiwan".to_string()),
            duration_days: Some(5),
            num_travelers: Some(2),
            ..IntentSlots::default()
        };
        let prompt = user_prompt("go", &slots);
        assert!(prompt.contains("All required info collected. Generate a detailed itinerary now."));
    }
}
