//! SubscriberSession (`spec.md` §4.5): owns the cursor, applies the
//! filter, sends matching events, and emits keepalives when filtered-out
//! events accumulate.

use crate::filter::{Decision, EventFilter};
use crate::model::{Cursor, Event, SubscribeMetadataResponse, SubscribeRequest};

/// Suppressed events between two sends before a keepalive is attempted.
pub const UNSYNCED_EVENT_THRESHOLD: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Suppressed,
    KeepaliveSent,
    KeepaliveFailed,
}

/// A sink the session writes responses to. Abstracted so the session has
/// no dependency on any particular transport (§5: sending must never hold
/// a buffer lock, and must not block sibling sessions on backpressure).
pub trait ResponseSink {
    fn send(&mut self, response: SubscribeMetadataResponse) -> Result<(), anyhow::Error>;
}

pub struct SubscriberSession<S> {
    request: SubscribeRequest,
    filter: EventFilter,
    cursor: Cursor,
    filtered_since_last_send: u32,
    threshold: u32,
    sink: S,
}

impl<S: ResponseSink> SubscriberSession<S> {
    pub fn new(request: SubscribeRequest, local_signature: i32, sink: S) -> Self {
        Self::with_filter(EventFilter::new(local_signature), request, sink)
    }

    /// As `new`, but with a caller-supplied `EventFilter` — used by
    /// `meta-node` to plug in the configured system-log-dir (§1.3 of
    /// `SPEC_FULL.md`) instead of the library default.
    pub fn with_filter(filter: EventFilter, request: SubscribeRequest, sink: S) -> Self {
        let cursor = Cursor(request.since_ns);
        Self {
            filter,
            request,
            cursor,
            filtered_since_last_send: 0,
            threshold: UNSYNCED_EVENT_THRESHOLD,
            sink,
        }
    }

    /// Override the keepalive threshold (default `UNSYNCED_EVENT_THRESHOLD`),
    /// configurable per `SPEC_FULL.md` §1.3.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Process one event already known to satisfy `ts_ns > cursor`
    /// (callers — the controller's persisted/in-memory callbacks — are
    /// the ones that enforce monotonic delivery order; see §3 invariants).
    pub fn process(&mut self, mut event: Event) -> Result<SendOutcome, anyhow::Error> {
        let ts_ns = event.ts_ns;
        let decision = self.filter.apply(&self.request, &mut event);
        self.cursor.advance_to(ts_ns);

        match decision {
            Decision::Deliver => {
                self.sink.send(event.into())?;
                self.filtered_since_last_send = 0;
                Ok(SendOutcome::Delivered)
            }
            Decision::Suppress => {
                self.filtered_since_last_send += 1;
                if self.filtered_since_last_send > self.threshold {
                    match self.sink.send(Event::keepalive(ts_ns).into()) {
                        Ok(()) => {
                            self.filtered_since_last_send = 0;
                            Ok(SendOutcome::KeepaliveSent)
                        }
                        Err(_) => Ok(SendOutcome::KeepaliveFailed),
                    }
                } else {
                    Ok(SendOutcome::Suppressed)
                }
            }
        }
    }
}
