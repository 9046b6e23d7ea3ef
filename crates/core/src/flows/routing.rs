use std::fmt;

use serde::{Serialize, Serializer};

use crate::domain::destination::Destination;
use crate::domain::slots::{
    IntentSlots, MISSING_DATES_OR_DURATION, MISSING_DESTINATION, MISSING_TRAVELERS,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    AskUser,
    Plan(Destination),
}

impl Route {
    pub fn label(self) -> String {
        match self {
            Self::AskUser => "ask_user".to_string(),
            Self::Plan(destination) => format!("plan_{}", destination.name()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub route: Route,
    /// Set when slots are complete but the destination fell back to
    /// [`Destination::DEFAULT`].
    pub low_confidence: bool,
}

pub fn is_complete(slots: &IntentSlots) -> bool {
    slots.is_complete()
}

pub fn missing_fields(slots: &IntentSlots) -> Vec<&'static str> {
    slots.missing_fields()
}

pub fn route(slots: &IntentSlots) -> Route {
    decide(slots).route
}

pub fn decide(slots: &IntentSlots) -> RoutingDecision {
    if !slots.is_complete() {
        return RoutingDecision { route: Route::AskUser, low_confidence: false };
    }

    match slots.destination.as_deref().and_then(Destination::recognize) {
        Some(destination) => {
            RoutingDecision { route: Route::Plan(destination), low_confidence: false }
        }
        None => RoutingDecision { route: Route::Plan(Destination::DEFAULT), low_confidence: true },
    }
}

/// Fixed follow-up questions for each unsatisfied requirement.
pub fn clarifying_questions(missing: &[&str]) -> Vec<&'static str> {
    missing
        .iter()
        .filter_map(|field| match *field {
            MISSING_DESTINATION => {
                Some("Where would you like to go? We currently support Japan and Taiwan.")
            }
            MISSING_DATES_OR_DURATION => {
                Some("When are you planning to travel, and for how many days?")
            }
            MISSING_TRAVELERS => Some("How many people will be traveling?"),
            _ => None,
        })
        .collect()
}
