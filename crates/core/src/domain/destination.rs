use std::fmt;

use serde::{Deserialize, Serialize};

/// Destinations with a dedicated planning crew.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Japan,
    Taiwan,
}

impl Destination {
    pub const ALL: [Destination; 2] = [Destination::Japan, Destination::Taiwan];

    /// Used when slots are complete but name no supported destination.
    pub const DEFAULT: Destination = Destination::Japan;

    pub fn name(self) -> &'static str {
        match self {
            Self::Japan => "japan",
            Self::Taiwan => "taiwan",
        }
    }

    /// Case-insensitive substring match against each destination name, in
    /// declaration order.
    pub fn recognize(value: &str) -> Option<Self> {
        let normalized = value.to_lowercase();
        Self::ALL.into_iter().find(|destination| normalized.contains(destination.name()))
    }

    pub fn tool_server_key(self) -> &'static str {
        self.name()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
