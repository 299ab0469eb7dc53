//! Trimmed `ApiError` surface, limited to the handful of cases this core
//! can actually produce (`spec.md` §7 / `SPEC_FULL.md` §1.2): the RPC
//! framework and authentication this core's teacher wired in here are
//! out of scope.

use derive_more::Display;
use tracing::*;
use warp::{http::StatusCode, *};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ApiError {
    #[display(fmt = "The requested resource could not be found.")]
    NotFound,

    #[display(fmt = "Method not supported.")]
    MethodNotAllowed,

    #[display(
        fmt = "Content with type '{}' was requested but the resource is only capable of generating content of the following type(s): {}.",
        requested,
        supported
    )]
    NotAcceptable { supported: String, requested: String },

    #[display(fmt = "Invalid request. {}", cause)]
    BadRequest { cause: String },

    #[display(fmt = "Internal server error.")]
    Internal,
}
impl warp::reject::Reject for ApiError {}
impl std::error::Error for ApiError {}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl From<ApiError> for ApiErrorResponse {
    fn from(e: ApiError) -> Self {
        let (status, code) = match &e {
            ApiError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "ERR_INTERNAL"),
            ApiError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "ERR_METHOD_NOT_ALLOWED"),
            ApiError::NotAcceptable { .. } => (StatusCode::NOT_ACCEPTABLE, "ERR_NOT_ACCEPTABLE"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND"),
        };
        ApiErrorResponse {
            code: code.to_string(),
            status,
            message: e.to_string(),
        }
    }
}

pub fn handle_rejection(r: Rejection) -> Result<impl Reply, Rejection> {
    let api_err = if r.is_not_found() {
        ApiError::NotFound
    } else if let Some(umt) = r.find::<reject::UnsupportedMediaType>() {
        ApiError::BadRequest { cause: umt.to_string() }
    } else if let Some(e) = r.find::<ApiError>() {
        e.to_owned()
    } else if r.find::<reject::MethodNotAllowed>().is_some() {
        ApiError::MethodNotAllowed
    } else {
        warn!("unhandled rejection: {:?}", r);
        ApiError::Internal
    };

    let err_resp: ApiErrorResponse = api_err.into();
    let json = warp::reply::json(&err_resp);
    Ok(warp::reply::with_status(json, err_resp.status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp: ApiErrorResponse = ApiError::NotFound.into();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.code, "ERR_NOT_FOUND");
    }
}
