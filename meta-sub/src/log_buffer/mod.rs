//! The two storage-tier collaborators the controller stitches together
//! (`spec.md` §2.2/§2.3, §4.2/§4.3). Only the interfaces are in scope;
//! `file` and `ring` are reference implementations so `meta-node` has
//! something concrete to serve — the real on-disk format and aggregation
//! mechanism are out of scope per `spec.md` §1.

pub mod file;
pub mod ring;

use crate::model::Event;
use async_trait::async_trait;

/// Sentinel outcomes distinct from a fatal error (§4.2/§4.3/§7). Neither
/// variant is ever surfaced to the client; they only steer the
/// controller's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// The in-memory buffer no longer retains `from_ts_ns`; the
    /// controller must fall back to the persisted reader.
    ResumeFromDisk,
    /// A transient, recoverable condition; the controller sleeps and
    /// retries the in-memory phase.
    Retry,
}

/// Streams historical records starting at the first entry with
/// `ts_ns >= from_ts_ns`, invoking `on_entry` for each, in strict
/// non-decreasing timestamp order. Returns promptly once the persisted
/// tail is reached — it never blocks waiting for new persisted entries.
///
/// Returns the highest `ts_ns` delivered, or `0` if nothing at or after
/// `from_ts_ns` exists. A callback error aborts the read and propagates.
#[async_trait]
pub trait PersistedLogReader: Send + Sync {
    async fn read_persisted(
        &self,
        from_ts_ns: i64,
        on_entry: &mut (dyn FnMut(Event) -> Result<(), anyhow::Error> + Send),
    ) -> Result<i64, anyhow::Error>;
}

/// A condition to keep waiting for more in-memory entries once the ring
/// is exhausted. Returns `true` to block for a writer signal and resume,
/// `false` to exit the loop normally — e.g. because the client stream was
/// cancelled (§4.3, §5 "Cancellation").
#[async_trait]
pub trait WaitCondition: Send + Sync {
    async fn should_wait(&self) -> bool;
}

/// A bounded ring of recent events with a tail-follow protocol (§4.3).
#[async_trait]
pub trait InMemoryLogBuffer: Send + Sync {
    /// Deliver entries strictly after `from_ts_ns` to `on_entry`, in
    /// order, blocking on `wait` once the ring is exhausted. `reader_tag`
    /// identifies the caller for diagnostics only; it does not affect
    /// delivery.
    ///
    /// Returns the highest `ts_ns` delivered (or `from_ts_ns` if none),
    /// or a `Resume` sentinel, or a fatal error.
    async fn loop_process(
        &self,
        reader_tag: &str,
        from_ts_ns: i64,
        wait: &dyn WaitCondition,
        on_entry: &mut (dyn FnMut(Event) -> Result<(), anyhow::Error> + Send),
    ) -> Result<i64, LoopOutcome>;
}

/// The non-success half of `InMemoryLogBuffer::loop_process`'s result:
/// either a sentinel the controller interprets specially, or a fatal
/// error it propagates.
#[derive(Debug)]
pub enum LoopOutcome {
    Resume(Resume),
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for LoopOutcome {
    fn from(e: anyhow::Error) -> Self {
        LoopOutcome::Fatal(e)
    }
}
