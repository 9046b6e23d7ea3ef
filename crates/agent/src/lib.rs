//! Agent runtime for the wayfarer trip-planning assistant.
//!
//! One user turn flows through:
//! 1. **Pattern extraction** (`conversation`) - deterministic slots from the raw message
//! 2. **Routing** - completeness and destination decision from `wayfarer-core`
//! 3. **Reasoning** (`llm`) - chat completion with ordered model fallback
//! 4. **Annotation parsing** (`annotation`) - model-declared slots merged back in
//! 5. **Link validation** (`links`) - unreachable citations removed from the reply
//!
//! Progress is published per step through `flow_events`, and `tools` provides
//! the client for the remote tool servers crews call into.
//!
//! # Failure policy
//!
//! Network problems never escape a turn. The reasoning client, tool client,
//! link validator and emitter all degrade to a fallback value and log.

pub mod annotation;
pub mod conversation;
pub mod flow_events;
pub mod links;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod tools;

pub use annotation::{parse_slot_annotation, AnnotatedReply};
pub use conversation::{PatternTable, SlotExtractor};
pub use flow_events::{
    BusError, FlowBus, FlowEventEmitter, FlowSubscriber, FlowSubscription, InMemoryFlowBus,
    SubscriptionItem,
};
pub use links::LinkValidator;
pub use llm::{Completion, LlmClient, LlmError, ReasoningClient};
pub use runtime::{AgentRuntime, TurnOutcome, FALLBACK_REPLY};
pub use tools::{ToolCall, ToolCallError, ToolCallPhase, ToolClient};

#[cfg(feature = "redis")]
pub use flow_events::RedisFlowBus;
