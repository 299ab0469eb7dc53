use std::net::SocketAddr;

use futures::stream::{BoxStream, StreamExt};
use wsrpc::Service;

use crate::events::service::EventService;
use crate::model::{SubscribeMetadataResponse, SubscribeRequest};

fn peer_address(remote: Option<SocketAddr>) -> String {
    remote.map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Wraps `EventService::subscribe_aggregated` as a `wsrpc::Service`, the
/// teacher's own mechanism for exposing a streaming method over the
/// multiplexed websocket protocol (`spec.md` §6's `SubscribeMetadata`).
/// `Ctx` carries the connection's remote address through from
/// `wsrpc::serve`, per §4.7's registry identity.
pub struct Subscribe {
    event_service: EventService,
}

impl Service for Subscribe {
    type Req = SubscribeRequest;
    type Resp = SubscribeMetadataResponse;
    type Error = String;
    type Ctx = Option<SocketAddr>;

    fn serve(&self, ctx: Self::Ctx, req: Self::Req) -> BoxStream<'static, Result<Self::Resp, Self::Error>> {
        self.event_service
            .subscribe_aggregated(req, peer_address(ctx))
            .map(Ok)
            .boxed()
    }
}

pub fn service(event_service: EventService) -> Subscribe {
    Subscribe { event_service }
}

/// `SubscribeLocalMetadata` (§6): same wiring, attached to the node's own
/// local in-memory buffer instead of the aggregated one.
pub struct SubscribeLocal {
    event_service: EventService,
}

impl Service for SubscribeLocal {
    type Req = SubscribeRequest;
    type Resp = SubscribeMetadataResponse;
    type Error = String;
    type Ctx = Option<SocketAddr>;

    fn serve(&self, ctx: Self::Ctx, req: Self::Req) -> BoxStream<'static, Result<Self::Resp, Self::Error>> {
        self.event_service
            .subscribe_local(req, peer_address(ctx))
            .map(Ok)
            .boxed()
    }
}

pub fn local_service(event_service: EventService) -> SubscribeLocal {
    SubscribeLocal { event_service }
}
