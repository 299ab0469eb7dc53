mod filters;
mod handlers;
mod ndjson;

use warp::Filter;

use crate::events::service::EventService;

pub(crate) fn routes(event_service: EventService) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    filters::subscribe(event_service.clone()).or(filters::subscribe_local(event_service))
}
