//! Wires `SubscribeController` up to the two RPC surfaces of `spec.md`
//! §6. The controller's and buffer traits' callback-based contracts
//! (`per_entry_callback` in §4.2/§4.3) are naturally synchronous, so
//! rather than forcing them through `genawaiter`'s async `Gen`/`Co` the
//! way the teacher's `query`/`subscribe` do for its iterator-of-futures
//! store API, each session here runs its controller loop on its own
//! spawned task and forwards responses over an unbounded channel — the
//! channel's sender is the `ResponseSink`, and the receiver closing
//! (client disconnect) is what unblocks the controller per §5
//! "Cancellation".

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::controller::{SubscribeController, Variant, IDLE_POLL_INTERVAL};
use crate::filter::EventFilter;
use crate::log_buffer::ring::RingLogBuffer;
use crate::log_buffer::{PersistedLogReader, WaitCondition};
use crate::model::{SubscribeMetadataResponse, SubscribeRequest};
use crate::registry::ClientRegistry;
use crate::session::{ResponseSink, SubscriberSession, UNSYNCED_EVENT_THRESHOLD};

/// The handful of `SPEC_FULL.md` §1.3 config knobs that flow through to
/// each session/controller pair, as opposed to the ones (bind address,
/// persisted-log directory, ring buffer capacity) that only matter at
/// construction time for `meta-node`.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub unsynced_event_threshold: u32,
    pub idle_poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unsynced_event_threshold: UNSYNCED_EVENT_THRESHOLD,
            idle_poll_interval: IDLE_POLL_INTERVAL,
        }
    }
}

struct ChannelSink(tokio::sync::mpsc::UnboundedSender<SubscribeMetadataResponse>);

impl ResponseSink for ChannelSink {
    fn send(&mut self, response: SubscribeMetadataResponse) -> Result<(), anyhow::Error> {
        self.0
            .send(response)
            .map_err(|_| anyhow::anyhow!("client stream closed"))
    }
}

/// Blocks indefinitely for more in-memory entries; the only way a
/// session unblocks is the in-memory buffer's own `Notify` firing, or the
/// `ChannelSink` erroring out because the client disconnected (which
/// happens on the controller's next delivered event, not while parked in
/// `should_wait` itself — see the open question in `spec.md` §9).
struct AlwaysWait;
#[async_trait::async_trait]
impl WaitCondition for AlwaysWait {
    async fn should_wait(&self) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct EventService {
    persisted: Arc<dyn PersistedLogReader>,
    local_memory: RingLogBuffer,
    aggregated_memory: RingLogBuffer,
    registry: ClientRegistry,
    local_signature: i32,
    system_log_dir: String,
    config: ServiceConfig,
}

impl EventService {
    pub fn new(
        persisted: Arc<dyn PersistedLogReader>,
        local_memory: RingLogBuffer,
        aggregated_memory: RingLogBuffer,
        local_signature: i32,
    ) -> Self {
        Self {
            persisted,
            local_memory,
            aggregated_memory,
            registry: ClientRegistry::new(),
            local_signature,
            system_log_dir: crate::filter::SYSTEM_LOG_DIR.to_string(),
            config: ServiceConfig::default(),
        }
    }

    /// As `new`, with the configured system-log directory and per-session
    /// tuning knobs `meta-node` reads from `Config` (`SPEC_FULL.md` §1.3)
    /// instead of the library defaults.
    pub fn with_config(mut self, system_log_dir: String, config: ServiceConfig) -> Self {
        self.system_log_dir = system_log_dir;
        self.config = config;
        self
    }

    pub fn subscribe_local(
        &self,
        request: SubscribeRequest,
        peer_address: String,
    ) -> BoxStream<'static, SubscribeMetadataResponse> {
        self.subscribe_with(request, peer_address, self.local_memory.clone(), Variant::Local)
    }

    pub fn subscribe_aggregated(
        &self,
        request: SubscribeRequest,
        peer_address: String,
    ) -> BoxStream<'static, SubscribeMetadataResponse> {
        self.subscribe_with(
            request,
            peer_address,
            self.aggregated_memory.clone(),
            Variant::Aggregated,
        )
    }

    fn subscribe_with(
        &self,
        request: SubscribeRequest,
        peer_address: String,
        memory: RingLogBuffer,
        variant: Variant,
    ) -> BoxStream<'static, SubscribeMetadataResponse> {
        let persisted = self.persisted.clone();
        let registry = self.registry.clone();
        let local_signature = self.local_signature;
        let filter = EventFilter::with_system_log_dir(local_signature, self.system_log_dir.clone());
        let config = self.config;
        let client_name = request.client_name.clone();
        let reader_tag = match variant {
            Variant::Local => "local",
            Variant::Aggregated => "aggregated",
        };

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let _handle = registry.register(&client_name, &peer_address);
            let session = SubscriberSession::with_filter(filter, request, ChannelSink(tx))
                .with_threshold(config.unsynced_event_threshold);
            let mut controller = SubscribeController::new(
                persisted,
                Arc::new(memory),
                AlwaysWait,
                variant,
                reader_tag.to_string(),
                session,
            )
            .with_idle_poll_interval(config.idle_poll_interval);
            if let Err(e) = controller.run().await {
                tracing::debug!(error = %e, "subscription terminated");
            }
        });

        UnboundedReceiverStream::new(rx).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryInfo, Event};
    use async_trait::async_trait;
    use tokio_stream::StreamExt as _;

    struct EmptyPersisted;
    #[async_trait]
    impl PersistedLogReader for EmptyPersisted {
        async fn read_persisted(
            &self,
            _from_ts_ns: i64,
            _on_entry: &mut (dyn FnMut(Event) -> Result<(), anyhow::Error> + Send),
        ) -> Result<i64, anyhow::Error> {
            Ok(0)
        }
    }

    fn event(ts_ns: i64) -> Event {
        Event {
            directory: "/a".into(),
            old_entry: None,
            new_entry: Some(EntryInfo {
                name: "x".into(),
                attributes: serde_cbor::Value::Null,
            }),
            new_parent_path: None,
            signatures: vec![],
            ts_ns,
        }
    }

    #[tokio::test]
    async fn subscribe_local_streams_events_pushed_to_the_local_ring() {
        let local_memory = RingLogBuffer::new(16);
        let aggregated_memory = RingLogBuffer::new(16);
        let service = EventService::new(Arc::new(EmptyPersisted), local_memory.clone(), aggregated_memory, 1);

        let request = SubscribeRequest {
            client_name: "t".into(),
            path_prefix: "/".into(),
            path_prefixes: vec![],
            since_ns: 0,
            signature: 0,
        };
        let mut stream = service.subscribe_local(request, "127.0.0.1:9000".to_string());

        // Give the spawned controller a moment to reach the in-memory
        // phase and start waiting before pushing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        local_memory.push(event(10));

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream should yield before the timeout")
            .expect("stream should not be closed");
        assert_eq!(first.ts_ns, 10);
    }

    #[test]
    fn default_service_config_matches_library_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.unsynced_event_threshold, UNSYNCED_EVENT_THRESHOLD);
        assert_eq!(config.idle_poll_interval, IDLE_POLL_INTERVAL);
    }
}
