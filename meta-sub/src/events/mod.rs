mod http;
pub mod service;
mod ws;

use warp::*;

use crate::events::service::EventService;

pub(crate) fn routes(event_service: EventService) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    http::routes(event_service.clone()).or(ws::routes(event_service))
}
