//! HTTP-facing interception adapter.
//!
//! Consumed by the dispatcher: turns an inbound hyper request into a proxied
//! call and the call's outcome into an HTTP response. Failures surface as
//! status 500 with the error's message as body.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{header, Request, Response, StatusCode};
use tracing::debug;

use super::{Params, Proxy};
use crate::registry::Method;
use crate::response::{build_response, build_response_with_headers};

impl Proxy {
    pub async fn intercept_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let cookie = req
            .headers()
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let query = req.uri().query().map(str::to_string);

        let params = match self.profile().method {
            Method::Get => query.map(Params::Raw).unwrap_or_default(),
            // The inbound body is read in full before params are built.
            Method::Post => match req.into_body().collect().await {
                Ok(collected) => {
                    let bytes = collected.to_bytes();
                    if bytes.is_empty() {
                        Params::None
                    } else {
                        Params::Raw(String::from_utf8_lossy(&bytes).into_owned())
                    }
                }
                Err(e) => {
                    return build_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("failed to read request body: {e}"),
                    )
                }
            },
        };

        match self.request(&params, cookie.as_deref()).await {
            Ok(body) => build_response_with_headers(
                StatusCode::OK,
                [("Content-Type", self.profile().data_type.content_type())],
                body.to_bytes(),
            ),
            Err(e) => {
                debug!(
                    "interception of interface [{}] failed: {}",
                    self.profile().id,
                    e
                );
                build_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}
