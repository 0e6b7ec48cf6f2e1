//! In-memory content registry.

use crate::registry::ContentRegistry;
use crate::types::{Address, Hash};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Content root → providers, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentRegistry {
    inner: Arc<Mutex<HashMap<Hash, Vec<Address>>>>,
}

impl InMemoryContentRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentRegistry for InMemoryContentRegistry {
    fn providers_by_content_hash(&self, root: &Hash) -> Vec<Address> {
        self.inner.lock().get(root).cloned().unwrap_or_default()
    }

    fn add_provider_to_content_hash(&self, root: Hash, provider: Address) {
        let mut map = self.inner.lock();
        let providers = map.entry(root).or_default();
        if !providers.contains(&provider) {
            providers.push(provider);
            debug!("Registered {} for content {}", provider, hex::encode(root));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_idempotent_and_ordered() {
        let registry = InMemoryContentRegistry::new();
        let root = [7u8; 32];
        registry.add_provider_to_content_hash(root, Address([2; 20]));
        registry.add_provider_to_content_hash(root, Address([1; 20]));
        registry.add_provider_to_content_hash(root, Address([2; 20]));

        assert_eq!(
            registry.providers_by_content_hash(&root),
            vec![Address([2; 20]), Address([1; 20])]
        );
        assert!(registry.providers_by_content_hash(&[0u8; 32]).is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InMemoryContentRegistry::new();
        let clone = registry.clone();
        clone.add_provider_to_content_hash([1u8; 32], Address([9; 20]));
        assert_eq!(registry.providers_by_content_hash(&[1u8; 32]).len(), 1);
    }
}
