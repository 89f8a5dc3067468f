use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entity::{EntityKind, EntityPatch, EntityView};
use crate::errors::WorkflowError;

/// Per-kind adapter over whatever storage holds one type of approvable
/// document.
#[async_trait]
pub trait EntityAccessor: Send + Sync {
    fn kind(&self) -> EntityKind;

    async fn get(&self, id: &str) -> Result<Option<EntityView>, WorkflowError>;

    /// Applies `patch` and returns the entity as stored afterwards.
    /// Fails with `NotFound` when `id` does not exist.
    async fn update(&self, id: &str, patch: EntityPatch) -> Result<EntityView, WorkflowError>;
}

#[derive(Clone, Default)]
pub struct AccessorRegistry {
    accessors: HashMap<EntityKind, Arc<dyn EntityAccessor>>,
}

impl AccessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `accessor` under its own kind, replacing any previous one.
    pub fn register(&mut self, accessor: Arc<dyn EntityAccessor>) -> &mut Self {
        self.accessors.insert(accessor.kind(), accessor);
        self
    }

    pub fn with(mut self, accessor: Arc<dyn EntityAccessor>) -> Self {
        self.register(accessor);
        self
    }

    pub fn resolve(&self, kind: EntityKind) -> Result<&Arc<dyn EntityAccessor>, WorkflowError> {
        self.accessors.get(&kind).ok_or_else(|| {
            WorkflowError::InvalidState(format!("unsupported entity kind `{kind}`"))
        })
    }

    pub fn kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self.accessors.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

pub(crate) fn entity_not_found(kind: EntityKind, id: &str) -> WorkflowError {
    WorkflowError::NotFound(format!("{kind} `{id}`"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{AccessorRegistry, EntityAccessor};
    use crate::domain::entity::{EntityKind, EntityPatch, EntityView};
    use crate::errors::WorkflowError;

    struct Fixed(EntityKind);

    #[async_trait]
    impl EntityAccessor for Fixed {
        fn kind(&self) -> EntityKind {
            self.0
        }

        async fn get(&self, id: &str) -> Result<Option<EntityView>, WorkflowError> {
            Ok(Some(EntityView::draft(self.0, id)))
        }

        async fn update(&self, id: &str, patch: EntityPatch) -> Result<EntityView, WorkflowError> {
            let mut entity = EntityView::draft(self.0, id);
            entity.apply(&patch);
            Ok(entity)
        }
    }

    #[test]
    fn registry_dispatches_by_kind() {
        let registry = AccessorRegistry::new()
            .with(Arc::new(Fixed(EntityKind::PurchaseOrder)))
            .with(Arc::new(Fixed(EntityKind::Production)));

        let accessor = registry.resolve(EntityKind::Production).expect("registered");
        assert_eq!(accessor.kind(), EntityKind::Production);
        assert_eq!(registry.kinds(), vec![EntityKind::PurchaseOrder, EntityKind::Production]);
    }

    #[test]
    fn unregistered_kind_is_invalid_state() {
        let registry = AccessorRegistry::new().with(Arc::new(Fixed(EntityKind::PurchaseOrder)));

        let error = registry.resolve(EntityKind::SaleOrder).err().expect("missing accessor");
        assert!(matches!(error, WorkflowError::InvalidState(ref message) if message.contains("sale_order")));
    }
}
