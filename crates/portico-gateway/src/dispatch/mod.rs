//! Interception dispatcher: maps inbound paths to interface proxies.
//!
//! The dispatcher owns no state of its own; it consults the shared context
//! for profiles and cached proxies. One reserved path serves the public
//! projection of every admitted interface, one serves process metrics, and
//! everything else is treated as an interface id.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error};

use crate::context::GatewayContext;
use crate::metrics;
use crate::response::{build_response, build_response_with_headers, empty_response, json_response};

/// Reserved introspection path listing every admitted interface.
pub const INTERFACES_PATH: &str = "/$interfaces";

/// Prometheus exposition path.
pub const METRICS_PATH: &str = "/metrics";

pub struct Dispatcher {
    ctx: Arc<GatewayContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Dispatcher { ctx }
    }

    pub async fn dispatch<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let path = req.uri().path().to_string();
        debug!("dispatching {} {}", req.method(), path);

        if path == INTERFACES_PATH {
            return self.count(json_response(
                StatusCode::OK,
                self.ctx.registry().get_client_interfaces(),
            ));
        }
        if path == METRICS_PATH {
            return build_response_with_headers(
                StatusCode::OK,
                [("Content-Type", "text/plain; version=0.0.4")],
                metrics::exposition(),
            );
        }

        let interface_id = path.trim_start_matches('/');
        let interceptable = match self.ctx.registry().get_profile(interface_id) {
            Some(profile) => profile.intercepted,
            None => false,
        };
        if !interceptable {
            return self.count(empty_response(StatusCode::NOT_FOUND));
        }

        match self.ctx.proxy(interface_id) {
            Ok(proxy) => self.count(proxy.intercept_request(req).await),
            Err(e) => {
                error!("failed to resolve proxy for [{}]: {}", interface_id, e);
                self.count(build_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                ))
            }
        }
    }

    fn count(&self, response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
        metrics::INTERCEPTIONS_TOTAL
            .with_label_values(&[response.status().as_str()])
            .inc();
        response
    }
}
