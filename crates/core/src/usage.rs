use async_trait::async_trait;

use crate::domain::session::SessionId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UsageDecision {
    Allow,
    Deny { reason: String },
}

/// Admission check consulted before a turn runs.
#[async_trait]
pub trait UsageGate: Send + Sync {
    async fn check(&self, session_id: &SessionId) -> UsageDecision;
}

#[derive(Clone, Debug, Default)]
pub struct UnmeteredUsage;

#[async_trait]
impl UsageGate for UnmeteredUsage {
    async fn check(&self, _session_id: &SessionId) -> UsageDecision {
        UsageDecision::Allow
    }
}
