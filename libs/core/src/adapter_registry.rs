use std::collections::BTreeMap;
use std::sync::Arc;

use crate::egress::{AdapterError, MessagingAdapter};
use crate::types::Platform;

pub type SharedAdapter = Arc<dyn MessagingAdapter>;

/// Outbound adapters keyed by the platform they deliver to.
///
/// A platform without credentials simply has no entry.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Platform, SharedAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its own [`MessagingAdapter::platform`].
    pub fn register(&mut self, adapter: SharedAdapter) -> Result<(), AdapterError> {
        let platform = adapter.platform();
        if self.adapters.contains_key(&platform) {
            return Err(AdapterError::Config(format!(
                "duplicate adapter registration for {platform}"
            )));
        }
        self.adapters.insert(platform, adapter);
        Ok(())
    }

    pub fn get(&self, platform: Platform) -> Option<SharedAdapter> {
        self.adapters.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
