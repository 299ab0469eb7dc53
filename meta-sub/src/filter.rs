//! EventFilter (`spec.md` §4.4): a stateless per-subscriber predicate,
//! total over all events — there is no `FilterInternalError` (§7).

use crate::model::{join_path, Event, SubscribeRequest};

pub const SYSTEM_LOG_DIR: &str = "/etc/seaweedfs/log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Suppress,
    Deliver,
}

pub struct EventFilter {
    local_signature: i32,
    system_log_dir: String,
}

impl EventFilter {
    pub fn new(local_signature: i32) -> Self {
        Self::with_system_log_dir(local_signature, SYSTEM_LOG_DIR.to_string())
    }

    pub fn with_system_log_dir(local_signature: i32, system_log_dir: String) -> Self {
        Self {
            local_signature,
            system_log_dir,
        }
    }

    /// Apply the five ordered rules of §4.4, mutating `event.signatures`
    /// in place (rule 2 runs regardless of delivery) and returning the
    /// delivery decision.
    pub fn apply(&self, request: &SubscribeRequest, event: &mut Event) -> Decision {
        // 1. Loop prevention.
        if request.signature != 0 && event.signatures.contains(&request.signature) {
            return Decision::Suppress;
        }

        // 2. Self-stamp, regardless of the eventual decision.
        if !event.signatures.contains(&self.local_signature) {
            event.signatures.push(self.local_signature);
        }

        // 3. Path derivation.
        let entry_name = match event.entry_name() {
            Some(name) => name,
            None => return Decision::Suppress,
        };
        let full_path = join_path(&event.directory, entry_name);

        // 4. System-path exclusion.
        if full_path.starts_with(&self.system_log_dir) {
            return Decision::Suppress;
        }

        // 5. Prefix match.
        if !request.path_prefixes.is_empty() && request.path_prefixes.iter().any(|p| full_path.starts_with(p)) {
            return Decision::Deliver;
        }
        if full_path.starts_with(&request.path_prefix) {
            return Decision::Deliver;
        }
        if let Some(new_parent_path) = &event.new_parent_path {
            let rewritten = join_path(new_parent_path, entry_name);
            if rewritten.starts_with(&request.path_prefix) {
                return Decision::Deliver;
            }
        }
        Decision::Suppress
    }
}
