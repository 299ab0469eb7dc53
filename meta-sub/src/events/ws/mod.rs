use std::sync::Arc;

use maplit::btreemap;
use warp::*;
use wsrpc::Service;

use crate::events::service::EventService;

mod subscribe;

pub(crate) fn routes(
    event_service: EventService,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let services = Arc::new(btreemap! {
      "subscribe"       => subscribe::service(event_service.clone()).boxed(),
      "subscribe_local" => subscribe::local_service(event_service).boxed(),
    });

    warp::path::end()
        .and(warp::ws())
        .and(warp::any().map(move || services.clone()))
        .and(warp::filters::addr::remote())
        .and_then(wsrpc::serve)
}
