use async_trait::async_trait;
use thiserror::Error;

use wayfarer_core::errors::DomainError;
use wayfarer_core::{IntentSlots, SessionId};

pub mod memory;
pub mod session_slots;

pub use memory::InMemorySessionSlotRepository;
pub use session_slots::SqlSessionSlotRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid slots: {0}")]
    Invalid(#[from] DomainError),
}

/// Accumulated slots, one value per session.
#[async_trait]
pub trait SessionSlotRepository: Send + Sync {
    async fn get(&self, session_id: &SessionId) -> Result<Option<IntentSlots>, RepositoryError>;

    /// Replaces the stored value. Slots failing validation are rejected.
    async fn put(&self, session_id: &SessionId, slots: &IntentSlots) -> Result<(), RepositoryError>;
}
