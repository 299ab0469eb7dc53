//! Wire-level and session-level types shared by the codec, filter, session
//! and controller. Grounded on `spec.md` §3; no field here is invented
//! beyond what the data model table names.

use serde::{Deserialize, Serialize};

/// One half of an `Event`'s old/new pair: an entry name plus whatever
/// metadata the producer attached. The metadata is opaque to this core —
/// only the name is needed for path derivation (§4.4 rule 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    #[serde(default)]
    pub attributes: serde_cbor::Value,
}

/// A single filesystem mutation record, as produced upstream and carried
/// through the persisted log and the in-memory ring alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub directory: String,
    #[serde(default)]
    pub old_entry: Option<EntryInfo>,
    #[serde(default)]
    pub new_entry: Option<EntryInfo>,
    #[serde(default)]
    pub new_parent_path: Option<String>,
    #[serde(default)]
    pub signatures: Vec<i32>,
    pub ts_ns: i64,
}

impl Event {
    /// The entry name used for path derivation: `old_entry` takes priority
    /// per §4.4 rule 3.
    pub fn entry_name(&self) -> Option<&str> {
        self.old_entry
            .as_ref()
            .or(self.new_entry.as_ref())
            .map(|e| e.name.as_str())
    }

    /// `join(self.directory, entry_name)`, or just `directory` if there is
    /// no entry name to append (shouldn't happen for a well-formed event,
    /// but the filter must not panic on it).
    pub fn full_path(&self) -> String {
        match self.entry_name() {
            Some(name) => join_path(&self.directory, name),
            None => self.directory.clone(),
        }
    }

    /// `true` if this event carries an empty notification payload and
    /// only exists to advance the client's cursor (§3, keepalive row).
    pub fn is_keepalive(&self) -> bool {
        self.directory.is_empty()
            && self.old_entry.is_none()
            && self.new_entry.is_none()
            && self.new_parent_path.is_none()
            && self.signatures.is_empty()
    }

    /// Build a keepalive carrying only `ts_ns`, per §3/§4.5.
    pub fn keepalive(ts_ns: i64) -> Event {
        Event {
            directory: String::new(),
            old_entry: None,
            new_entry: None,
            new_parent_path: None,
            signatures: Vec::new(),
            ts_ns,
        }
    }
}

/// `join(parent, name)`, collapsing the double slash that results when
/// `parent` already ends in `/` (the root directory is represented as `/`).
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Received once at stream open; immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub client_name: String,
    pub path_prefix: String,
    #[serde(default)]
    pub path_prefixes: Vec<String>,
    pub since_ns: i64,
    #[serde(default)]
    pub signature: i32,
}

/// One streamed reply. A keepalive is a response whose `event_notification`
/// is the zero-valued `Event` but `ts_ns` is set (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeMetadataResponse {
    pub directory: String,
    pub event_notification: Event,
    pub ts_ns: i64,
}

impl From<Event> for SubscribeMetadataResponse {
    fn from(event: Event) -> Self {
        SubscribeMetadataResponse {
            directory: event.directory.clone(),
            ts_ns: event.ts_ns,
            event_notification: event,
        }
    }
}

/// The monotonic read position of a session. Only ever moves forward
/// (§3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(pub i64);

impl Cursor {
    pub fn advance_to(&mut self, ts_ns: i64) {
        if ts_ns > self.0 {
            self.0 = ts_ns;
        }
    }
}
