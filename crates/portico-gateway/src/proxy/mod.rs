//! Per-interface proxy: the status-driven request/mock state machine.
//!
//! One [`Proxy`] instance serves one interface id. Depending on the resolved
//! status it either dispatches to the named backend environment over the
//! transport, or synthesizes a response from the interface's rule through the
//! mock engine.

pub mod handler;
pub mod query;
pub mod transport;


use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::metrics;
use crate::mock::{MockEngine, MockEngineError};
use crate::registry::{
    DataType, Encoding, InterfaceProfile, InterfaceStatus, Method, ProfileRegistry, RuleError,
};

pub use query::{query_stringify, Params};
pub use transport::{Transport, TransportError, TransportRequest, TransportResponse};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no such interface id defined: {0}")]
    UnknownInterface(String),
    #[error("interface [{id}] needs a cookie but none was supplied")]
    CookieRequired { id: String },
    #[error("no URL available to proxy for interface [{id}] in environment [{env}]")]
    NoUrl { id: String, env: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("mock engine failed for interface [{id}]: {source}")]
    Mock {
        id: String,
        #[source]
        source: MockEngineError,
    },
    #[error("interface [{id}] response is not valid JSON: {source}")]
    InvalidJson {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decoded result of one proxied call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Raw(Bytes),
    Text(String),
    Json(Value),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Bytes written to the wire by the interception adapter.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            ResponseBody::Raw(bytes) => bytes.clone(),
            ResponseBody::Text(text) => Bytes::from(text.clone()),
            ResponseBody::Json(value) => {
                Bytes::from(serde_json::to_vec(value).unwrap_or_default())
            }
        }
    }
}

pub struct Proxy {
    profile: InterfaceProfile,
    registry: Arc<ProfileRegistry>,
    engine: Arc<dyn MockEngine>,
    transport: Arc<dyn Transport>,
    /// Backend URL resolved at construction for `Env` status.
    target: Option<String>,
}

impl Proxy {
    /// Construct a proxy for an admitted profile. Fails when the resolved
    /// status names an environment with no URL to proxy.
    pub fn new(
        profile: InterfaceProfile,
        registry: Arc<ProfileRegistry>,
        engine: Arc<dyn MockEngine>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ProxyError> {
        let target = match &profile.status {
            InterfaceStatus::Env(env) => Some(
                profile
                    .urls
                    .get(env)
                    .ok_or_else(|| ProxyError::NoUrl {
                        id: profile.id.clone(),
                        env: env.clone(),
                    })?
                    .clone(),
            ),
            _ => None,
        };
        Ok(Proxy {
            profile,
            registry,
            engine,
            transport,
            target,
        })
    }

    pub fn profile(&self) -> &InterfaceProfile {
        &self.profile
    }

    /// Keyed accessor into the underlying profile.
    pub fn get_option(&self, key: &str) -> Option<Value> {
        self.profile.option(key)
    }

    /// Execute one call according to the interface's status.
    ///
    /// The cookie contract is checked before any dispatch: a cookie-needed
    /// interface called without a cookie fails without touching the
    /// transport or the mock engine.
    pub async fn request(
        &self,
        params: &Params,
        cookie: Option<&str>,
    ) -> Result<ResponseBody, ProxyError> {
        let mode = match self.profile.status {
            InterfaceStatus::Env(_) => "env",
            InterfaceStatus::Mock => "mock",
            InterfaceStatus::MockErr => "mockerr",
        };

        if self.profile.is_cookie_needed && cookie.is_none() {
            metrics::REQUESTS_TOTAL
                .with_label_values(&[mode, "error"])
                .inc();
            return Err(ProxyError::CookieRequired {
                id: self.profile.id.clone(),
            });
        }

        let result = match &self.profile.status {
            InterfaceStatus::Env(_) => self.request_backend(params, cookie).await,
            InterfaceStatus::Mock => self.request_mock(false),
            InterfaceStatus::MockErr => self.request_mock(true),
        };

        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::REQUESTS_TOTAL
            .with_label_values(&[mode, outcome])
            .inc();
        result
    }

    async fn request_backend(
        &self,
        params: &Params,
        cookie: Option<&str>,
    ) -> Result<ResponseBody, ProxyError> {
        let target = self.target.as_deref().ok_or_else(|| ProxyError::NoUrl {
            id: self.profile.id.clone(),
            env: self.profile.status.as_str().to_string(),
        })?;

        let query = query_stringify(params);
        let url = match (self.profile.method, query.is_empty()) {
            (Method::Get, false) => format!("{target}?{query}"),
            _ => target.to_string(),
        };
        let body = (self.profile.method == Method::Post).then_some(query);

        // Forward the cookie header only when one was supplied.
        let mut headers = Vec::new();
        if let Some(cookie) = cookie {
            headers.push(("Cookie".to_string(), cookie.to_string()));
        }

        let response = self
            .transport
            .send(TransportRequest {
                url,
                method: self.profile.method,
                body,
                headers,
                timeout: self.profile.timeout,
            })
            .await?;

        self.decode(response.body)
    }

    fn decode(&self, bytes: Bytes) -> Result<ResponseBody, ProxyError> {
        match &self.profile.encoding {
            Encoding::Raw => Ok(ResponseBody::Raw(bytes)),
            Encoding::Text(_) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                match self.profile.data_type {
                    DataType::Json => serde_json::from_str(&text)
                        .map(ResponseBody::Json)
                        .map_err(|source| ProxyError::InvalidJson {
                            id: self.profile.id.clone(),
                            source,
                        }),
                    _ => Ok(ResponseBody::Text(text)),
                }
            }
        }
    }

    /// Mock and mockerr branches. The rule's `response` member feeds the mock
    /// path, `responseError` the mockerr path; the payload's content, not
    /// this code, conveys what "error" means. Static rules skip the engine.
    fn request_mock(&self, errored: bool) -> Result<ResponseBody, ProxyError> {
        let rule = self.registry.get_rule(&self.profile.id)?;
        let member = if errored { "responseError" } else { "response" };
        let template = rule.get(member).cloned().unwrap_or(Value::Null);

        if self.profile.is_rule_static {
            return Ok(ResponseBody::Json(template));
        }

        self.engine
            .generate(&template)
            .map(ResponseBody::Json)
            .map_err(|source| ProxyError::Mock {
                id: self.profile.id.clone(),
                source,
            })
    }
}
