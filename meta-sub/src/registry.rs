//! ClientRegistry (`spec.md` §4.7): a process-wide set of connected
//! subscriber identities for observability. Membership does not gate
//! delivery — the delivery path never consults it (§5 "Shared
//! resources").

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<HashSet<String>>>,
}

/// Removes its entry from the registry and logs `- listener` on drop, so
/// every exit path (normal return, error, panic-unwind) cleans up — §4.7
/// "guaranteed on every exit path".
pub struct RegisteredClient {
    registry: ClientRegistry,
    name: String,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry key is `client_name@peer_address` (§4.7, §6 external
    /// interface): `client_name` is the subscriber-supplied tag from
    /// `SubscribeRequest`, `peer_address` is the actual connection
    /// address.
    pub fn register(&self, client_name: &str, peer_address: &str) -> RegisteredClient {
        let name = format!("{}@{}", client_name, peer_address);
        self.clients.lock().insert(name.clone());
        tracing::info!("+ listener {}", name);
        RegisteredClient {
            registry: self.clone(),
            name,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.lock().contains(name)
    }
}

impl Drop for RegisteredClient {
    fn drop(&mut self) {
        self.registry.clients.lock().remove(&self.name);
        tracing::info!("- listener {}", self.name);
    }
}
