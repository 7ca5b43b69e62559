//! Subscription registry implementation
//!
//! Publisher-side map between track names and subscription ids. Ids and
//! names are both unique among active subscriptions.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::error::RegistryError;

#[derive(Debug, Default)]
struct Subscriptions {
    by_name: HashMap<String, u64>,
    by_id: HashMap<u64, String>,
}

/// Registry of accepted subscriptions for one session
///
/// Thread-safe via `RwLock`; lookups from track writers run concurrently
/// with the control loop registering new subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<Subscriptions>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription
    ///
    /// Fails if either the id or the name is already registered; the
    /// registry is left unchanged in that case.
    pub async fn register(&self, name: &str, id: u64) -> Result<(), RegistryError> {
        let mut subs = self.subscriptions.write().await;

        if subs.by_id.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        if subs.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        subs.by_name.insert(name.to_string(), id);
        subs.by_id.insert(id, name.to_string());

        tracing::debug!(track = name, id = id, "Subscription registered");
        Ok(())
    }

    /// Subscription id for a track name
    pub async fn lookup(&self, name: &str) -> Option<u64> {
        self.subscriptions.read().await.by_name.get(name).copied()
    }

    /// Track name for a subscription id
    pub async fn name(&self, id: u64) -> Option<String> {
        self.subscriptions.read().await.by_id.get(&id).cloned()
    }

    /// Remove a subscription, returning its track name
    pub async fn unregister(&self, id: u64) -> Option<String> {
        let mut subs = self.subscriptions.write().await;
        let name = subs.by_id.remove(&id)?;
        subs.by_name.remove(&name);

        tracing::debug!(track = %name, id = id, "Subscription removed");
        Some(name)
    }

    /// Number of active subscriptions
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.by_id.len()
    }

    /// Check if there are no subscriptions
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
