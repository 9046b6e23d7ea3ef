use std::collections::HashMap;

use tokio::sync::RwLock;

use wayfarer_core::{IntentSlots, SessionId};

use super::{RepositoryError, SessionSlotRepository};

#[derive(Default)]
pub struct InMemorySessionSlotRepository {
    slots: RwLock<HashMap<String, IntentSlots>>,
}

#[async_trait::async_trait]
impl SessionSlotRepository for InMemorySessionSlotRepository {
    async fn get(&self, session_id: &SessionId) -> Result<Option<IntentSlots>, RepositoryError> {
        let slots = self.slots.read().await;
        Ok(slots.get(session_id.as_str()).cloned())
    }

    async fn put(&self, session_id: &SessionId, slots: &IntentSlots) -> Result<(), RepositoryError> {
        slots.validate()?;
        let mut stored = self.slots.write().await;
        stored.insert(session_id.as_str().to_string(), slots.clone());
        Ok(())
    }
}
