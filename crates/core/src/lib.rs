//! Domain core for the wayfarer trip-planning assistant.
//!
//! Holds the slot model, routing policy, flow-event types and configuration.
//! Nothing in this crate performs network I/O.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod usage;

pub use domain::destination::Destination;
pub use domain::session::SessionId;
pub use domain::slots::IntentSlots;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{CrewLabel, FlowEvent, FlowStatus, FlowStep, Route, RoutingDecision};
pub use usage::{UnmeteredUsage, UsageDecision, UsageGate};
