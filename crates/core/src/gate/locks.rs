use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::entity::EntityKind;

pub type EntityKey = (EntityKind, String);

/// Hands out one async mutex per entity so that read-check-write sequences
/// on the same entity never interleave.
#[derive(Default)]
pub struct EntityLocks {
    slots: Mutex<HashMap<EntityKey, Arc<AsyncMutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, kind: EntityKind, entity_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(slots) => slots,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Entries only referenced by the map are idle.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry((kind, entity_id.to_string())).or_default())
        };
        slot.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
