//! SubscribeController (`spec.md` §4.6): the outer loop per session,
//! alternating persisted and in-memory phases. The aggregated and local
//! variants share this exact structure and differ only in which
//! `InMemoryLogBuffer` they attach to and which `WaitCondition` they pass
//! (§4.6's "wait_fn" note).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use crate::log_buffer::{InMemoryLogBuffer, LoopOutcome, PersistedLogReader, Resume, WaitCondition};
use crate::session::{ResponseSink, SubscriberSession};

/// ~1.1s, deliberately non-round to desynchronize concurrently-started
/// subscribers (§4.6, §9 "Why 1127 ms poll").
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1127);

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("reading persisted logs: {0}")]
    PersistedRead(#[source] anyhow::Error),
    #[error("reading in-memory log: {0}")]
    InMemoryFatal(#[source] anyhow::Error),
    #[error("sending to client: {0}")]
    Send(#[source] anyhow::Error),
}

/// Distinguishes the two RPC surfaces of §6 only insofar as it changes
/// which sleep edges are taken in the loop (§4.6's pseudocode comment
/// "local variant only" / "aggregated variant polls between cycles");
/// both converge on serving from `cursor`, per `SPEC_FULL.md` §2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Local,
    Aggregated,
}

pub struct SubscribeController<R: ?Sized, B: ?Sized, W, S> {
    persisted: Arc<R>,
    memory: Arc<B>,
    wait: W,
    variant: Variant,
    reader_tag: String,
    session: SubscriberSession<S>,
    idle_poll_interval: Duration,
}

impl<R, B, W, S> SubscribeController<R, B, W, S>
where
    R: PersistedLogReader + ?Sized,
    B: InMemoryLogBuffer + ?Sized,
    W: WaitCondition,
    S: ResponseSink,
{
    pub fn new(
        persisted: Arc<R>,
        memory: Arc<B>,
        wait: W,
        variant: Variant,
        reader_tag: String,
        session: SubscriberSession<S>,
    ) -> Self {
        Self {
            persisted,
            memory,
            wait,
            variant,
            reader_tag,
            session,
            idle_poll_interval: IDLE_POLL_INTERVAL,
        }
    }

    /// Override the idle poll interval (default `IDLE_POLL_INTERVAL`),
    /// configurable per `SPEC_FULL.md` §1.3.
    pub fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    /// Run until the session terminates (unrecoverable error, stream
    /// cancellation, or client disconnect — cancellation is expected to
    /// be plumbed into `W` so `should_wait` returns promptly, per §5).
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        let mut resumed_from_disk = false;
        loop {
            let mut cursor = self.session.cursor().0;
            let session = &mut self.session;
            let persisted_result = self
                .persisted
                .read_persisted(cursor, &mut |event| {
                    session.process(event).map(|_| ()).context("sending to client")
                })
                .await
                .map_err(ControllerError::PersistedRead)?;

            if persisted_result != 0 {
                cursor = persisted_result;
                resumed_from_disk = false;
            } else if resumed_from_disk && self.variant == Variant::Local {
                tokio::time::sleep(self.idle_poll_interval).await;
                continue;
            }

            let session = &mut self.session;
            let memory_result = self
                .memory
                .loop_process(&self.reader_tag, cursor, &self.wait, &mut |event| {
                    session.process(event).map(|_| ()).context("sending to client")
                })
                .await;

            match memory_result {
                Ok(_) => {
                    resumed_from_disk = false;
                }
                Err(LoopOutcome::Resume(Resume::ResumeFromDisk)) => {
                    resumed_from_disk = true;
                    tokio::time::sleep(self.idle_poll_interval).await;
                    continue;
                }
                Err(LoopOutcome::Resume(Resume::Retry)) => {
                    resumed_from_disk = false;
                }
                Err(LoopOutcome::Fatal(e)) => {
                    tracing::error!(error = %e, "in-memory phase terminated");
                    return Err(ControllerError::InMemoryFatal(e));
                }
            }

            if self.variant == Variant::Aggregated {
                tokio::time::sleep(self.idle_poll_interval).await;
            }
        }
    }
}
