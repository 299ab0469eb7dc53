//! Reference `InMemoryLogBuffer`: a bounded `VecDeque` behind a
//! `parking_lot::Mutex`, with `tokio::sync::Notify` standing in for the
//! teacher's listener condition variable — the idiomatic async analogue
//! of a condvar, since this codebase is tokio-async rather than the
//! original's goroutine/condvar model (`spec.md` §9 re-architecture
//! note).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::log_buffer::{InMemoryLogBuffer, LoopOutcome, Resume, WaitCondition};
use crate::model::Event;

struct Inner {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
    notify: Notify,
}

/// Shared by every subscriber session reading from this buffer and by
/// whatever writer appends events; only the buffer owns the lock and the
/// `Notify`, per §5 "Shared resources".
#[derive(Clone)]
pub struct RingLogBuffer {
    inner: Arc<Inner>,
}

impl RingLogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                events: Mutex::new(VecDeque::with_capacity(capacity)),
                notify: Notify::new(),
            }),
        }
    }

    /// Append an event, evicting the oldest if the ring is at capacity,
    /// and wake any waiting readers.
    pub fn push(&self, event: Event) {
        {
            let mut events = self.inner.events.lock();
            if events.len() >= self.inner.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
        self.inner.notify.notify_waiters();
    }

    fn oldest_ts_ns(&self) -> Option<i64> {
        self.inner.events.lock().front().map(|e| e.ts_ns)
    }
}

#[async_trait]
impl InMemoryLogBuffer for RingLogBuffer {
    async fn loop_process(
        &self,
        reader_tag: &str,
        from_ts_ns: i64,
        wait: &dyn WaitCondition,
        on_entry: &mut (dyn FnMut(Event) -> Result<(), anyhow::Error> + Send),
    ) -> Result<i64, LoopOutcome> {
        if let Some(oldest) = self.oldest_ts_ns() {
            if from_ts_ns < oldest {
                tracing::debug!(reader_tag, from_ts_ns, oldest, "ring truncated past cursor");
                return Err(LoopOutcome::Resume(Resume::ResumeFromDisk));
            }
        }

        let mut cursor = from_ts_ns;
        loop {
            // Snapshot pending entries under the lock, then release it
            // before invoking callbacks — §5 "No locks held across sends".
            let pending: Vec<Event> = {
                let events = self.inner.events.lock();
                events.iter().filter(|e| e.ts_ns > cursor).cloned().collect()
            };

            if pending.is_empty() {
                if wait.should_wait().await {
                    self.inner.notify.notified().await;
                    continue;
                } else {
                    return Ok(cursor);
                }
            }

            for event in pending {
                cursor = event.ts_ns;
                on_entry(event).map_err(LoopOutcome::Fatal)?;
            }
        }
    }
}
