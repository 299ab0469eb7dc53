use std::net::SocketAddr;

use crate::events::http::ndjson;
use crate::events::service::EventService;
use crate::model::SubscribeRequest;

fn peer_address(remote: Option<SocketAddr>) -> String {
    remote.map(|a| a.to_string()).unwrap_or_else(|| "unknown".to_string())
}

pub(crate) async fn subscribe(
    request: SubscribeRequest,
    remote: Option<SocketAddr>,
    event_service: EventService,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let events = event_service.subscribe_aggregated(request, peer_address(remote));
    Ok(ndjson::reply(ndjson::keep_alive().stream(events)))
}

pub(crate) async fn subscribe_local(
    request: SubscribeRequest,
    remote: Option<SocketAddr>,
    event_service: EventService,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let events = event_service.subscribe_local(request, peer_address(remote));
    Ok(ndjson::reply(ndjson::keep_alive().stream(events)))
}
