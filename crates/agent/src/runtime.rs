use std::sync::Arc;

use tracing::{info, warn};
use wayfarer_core::flows::{decide, Route, RoutingDecision};
use wayfarer_core::{
    CrewLabel, Destination, FlowEvent, FlowStatus, FlowStep, IntentSlots, SessionId,
};

use crate::annotation::parse_slot_annotation;
use crate::conversation::SlotExtractor;
use crate::flow_events::FlowEventEmitter;
use crate::links::LinkValidator;
use crate::llm::LlmClient;
use crate::prompts::{user_prompt, PromptCatalog};

/// Returned when no candidate model produced a reply.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, all AI models are currently unavailable. Please try again in a few minutes.";

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    /// Text shown to the user, annotation already removed.
    pub reply: String,
    pub slots: IntentSlots,
    pub decision: RoutingDecision,
    /// Model that answered; `None` when the fallback reply was used.
    pub model: Option<String>,
}

/// Drives one conversational turn from raw message to reply and slots.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    models: Vec<String>,
    emitter: FlowEventEmitter,
    extractor: SlotExtractor,
    prompts: PromptCatalog,
    link_validator: Option<LinkValidator>,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, models: Vec<String>, emitter: FlowEventEmitter) -> Self {
        Self {
            llm,
            models,
            emitter,
            extractor: SlotExtractor::new(),
            prompts: PromptCatalog::new(),
            link_validator: None,
        }
    }

    pub fn with_extractor(mut self, extractor: SlotExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_link_validator(mut self, validator: LinkValidator) -> Self {
        self.link_validator = Some(validator);
        self
    }

    pub fn emitter(&self) -> &FlowEventEmitter {
        &self.emitter
    }

    async fn emit(&self, session_id: &SessionId, event: FlowEvent) {
        self.emitter.emit(session_id, event).await;
    }

    /// Runs one turn. Never fails: when every model is down the fixed
    /// [`FALLBACK_REPLY`] is returned together with the message-derived slots.
    pub async fn process_turn(
        &self,
        session_id: &SessionId,
        message: &str,
        prior: &IntentSlots,
        locale: &str,
    ) -> TurnOutcome {
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::Received, FlowStatus::Active, "Message received"),
        )
        .await;

        self.emit(
            session_id,
            FlowEvent::new(
                FlowStep::IntentParsing,
                FlowStatus::Active,
                "Extracting intent from user message",
            )
            .with_crew("intent"),
        )
        .await;
        let extracted = self.extractor.extract(message);
        let mut slots = IntentSlots::merge(prior, &extracted);
        info!(
            event_name = "agent.runtime.slots_extracted",
            session_id = %session_id,
            extracted = ?extracted,
            merged = ?slots,
            "pattern extraction merged"
        );
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::IntentParsing, FlowStatus::Done, "Slots extracted from message")
                .with_crew("intent")
                .with_slots(&slots),
        )
        .await;

        self.emit(
            session_id,
            FlowEvent::new(FlowStep::Routing, FlowStatus::Active, "Checking slot completeness")
                .with_crew("router"),
        )
        .await;
        let decision = decide(&slots);
        if decision.low_confidence {
            info!(
                event_name = "agent.runtime.route_low_confidence",
                session_id = %session_id,
                destination = ?slots.destination,
                route = %decision.route,
                "destination not recognised; planning with default destination"
            );
        }
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::Routing, FlowStatus::Done, format!("Route: {}", decision.route))
                .with_crew("router")
                .with_slots(&slots),
        )
        .await;

        let system = self.prompts.system_prompt(prior.is_empty(), locale);
        let user = user_prompt(message, &slots);
        let crew = planning_crew(&decision, &slots);

        self.emit(
            session_id,
            FlowEvent::new(FlowStep::Planning, FlowStatus::Active, "Waiting for LLM response")
                .with_crew(crew.clone()),
        )
        .await;

        let Some(completion) = self.llm.generate(&system, &user, &self.models).await else {
            warn!(
                event_name = "agent.runtime.fallback_reply",
                session_id = %session_id,
                "no model answered; returning fallback reply"
            );
            self.emit(
                session_id,
                FlowEvent::new(FlowStep::Complete, FlowStatus::Error, "All LLM models unavailable")
                    .with_slots(&slots),
            )
            .await;
            return TurnOutcome { reply: FALLBACK_REPLY.to_string(), slots, decision, model: None };
        };

        self.emit(
            session_id,
            FlowEvent::new(
                FlowStep::Planning,
                FlowStatus::Done,
                format!("LLM responded ({})", completion.model),
            )
            .with_crew(crew),
        )
        .await;

        let post_crews: &[&str] = &["booking", "advisory"];
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::PostProcessing, FlowStatus::Active, "Extracting LLM slots")
                .with_crew(post_crews),
        )
        .await;
        let annotated = parse_slot_annotation(&completion.content);
        if let Some(model_slots) = &annotated.slots {
            slots.merge_from(model_slots);
            info!(
                event_name = "agent.runtime.model_slots_merged",
                session_id = %session_id,
                model_slots = ?model_slots,
                merged = ?slots,
                "model-declared slots merged"
            );
        }
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::PostProcessing, FlowStatus::Done, "Slots merged")
                .with_crew(post_crews)
                .with_slots(&slots),
        )
        .await;

        let mut reply = annotated.visible;
        if let Some(validator) = &self.link_validator {
            self.emit(
                session_id,
                FlowEvent::new(FlowStep::LinkValidation, FlowStatus::Active, "Validating links")
                    .with_crew("link_validator"),
            )
            .await;
            reply = validator.validate(&reply).await;
            self.emit(
                session_id,
                FlowEvent::new(FlowStep::LinkValidation, FlowStatus::Done, "Links validated")
                    .with_crew("link_validator"),
            )
            .await;
        }

        info!(
            event_name = "agent.runtime.turn_completed",
            session_id = %session_id,
            model = %completion.model,
            complete = slots.is_complete(),
            "turn completed"
        );
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::Synthesizing, FlowStatus::Done, "Response ready")
                .with_crew("synthesis")
                .with_slots(&slots),
        )
        .await;
        self.emit(
            session_id,
            FlowEvent::new(FlowStep::Complete, FlowStatus::Done, "All done").with_slots(&slots),
        )
        .await;

        TurnOutcome { reply, slots, decision, model: Some(completion.model) }
    }
}

/// Crew label for the planning step: the routed destination, otherwise the
/// recognised destination, otherwise the default.
fn planning_crew(decision: &RoutingDecision, slots: &IntentSlots) -> CrewLabel {
    let destination = match decision.route {
        Route::Plan(destination) => destination,
        Route::AskUser => slots
            .destination
            .as_deref()
            .and_then(Destination::recognize)
            .unwrap_or(Destination::DEFAULT),
    };
    CrewLabel::from(destination.name())
}
