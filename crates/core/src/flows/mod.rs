pub mod events;
pub mod routing;

pub use events::{CrewLabel, FlowEvent, FlowStatus, FlowStep};
pub use routing::{clarifying_questions, decide, route, Route, RoutingDecision};
