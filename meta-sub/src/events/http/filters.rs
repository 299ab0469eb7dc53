use warp::filters::*;
use warp::*;

use crate::events::{http::handlers, service::EventService};
use crate::util::filters::accept_ndjson;

pub fn with_service(
    event_service: EventService,
) -> impl Filter<Extract = (EventService,), Error = std::convert::Infallible> + Clone {
    any().map(move || event_service.clone())
}

pub fn subscribe(event_service: EventService) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    path("subscribe")
        .and(path::end())
        .and(post())
        .and(accept_ndjson())
        .and(body::json())
        .and(addr::remote())
        .and(with_service(event_service))
        .and_then(handlers::subscribe)
}

pub fn subscribe_local(event_service: EventService) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    path("subscribe_local")
        .and(path::end())
        .and(post())
        .and(accept_ndjson())
        .and(body::json())
        .and(addr::remote())
        .and(with_service(event_service))
        .and_then(handlers::subscribe_local)
}
