pub mod codec;
pub mod controller;
pub mod events;
pub mod filter;
pub mod log_buffer;
pub mod model;
pub mod registry;
mod rejections;
pub mod session;
mod util;

use std::fmt;

use warp::*;

pub use crate::events::service::EventService;
pub use crate::model::{EntryInfo, Event, SubscribeMetadataResponse, SubscribeRequest};

/// Builds the full set of routes exposing `EventService`'s two subscribe
/// endpoints (`spec.md` §6) — `SubscribeMetadata`/`SubscribeLocalMetadata`
/// over both a websocket (`wsrpc`, matching the teacher's own RPC
/// transport) and a plain ndjson HTTP stream. Bound and served by
/// `meta-node`; this crate only assembles the `warp::Filter`.
pub fn routes(event_service: EventService) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let events = events::routes(event_service);
    let api_path = path!("api" / "v1" / ..);

    let cors = cors()
        .allow_any_origin()
        .allow_headers(vec!["accept", "authorization", "content-type"])
        .allow_methods(&[http::Method::GET, http::Method::POST]);

    let log = warp::log::custom(|info| {
        tracing::debug!(
            remote_addr=%OptFmt(info.remote_addr()),
            method=%info.method(),
            path=%info.path(),
            version=?info.version(),
            status=%info.status().as_u16(),
            elapsed=?info.elapsed(),
            "processed request"
        );
    });

    api_path
        .and(events)
        .recover(|r| async { rejections::handle_rejection(r) })
        .with(cors)
        .with(log)
}

struct OptFmt<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OptFmt<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref t) = self.0 {
            fmt::Display::fmt(t, f)
        } else {
            f.write_str("-")
        }
    }
}
