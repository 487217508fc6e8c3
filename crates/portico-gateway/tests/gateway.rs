//! End-to-end tests: configuration on disk, registry load, dispatch, and
//! aggregation through the public API.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use portico_gateway::aggregate::{AggregateOutcome, Aggregator};
use portico_gateway::context::GatewayContext;
use portico_gateway::dispatch::{Dispatcher, INTERFACES_PATH};
use portico_gateway::proxy::{
    Params, Transport, TransportError, TransportRequest, TransportResponse,
};
use portico_gateway::registry::ProfileRegistry;

/// Canned transport: answers everything with one JSON body and counts calls.
struct CannedTransport {
    body: &'static str,
    calls: AtomicUsize,
}

impl CannedTransport {
    fn new(body: &'static str) -> Arc<Self> {
        Arc::new(CannedTransport {
            body,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransportResponse {
            status: 200,
            body: Bytes::from(self.body),
        })
    }
}

/// Write a full deployment to disk: config document plus rule files under
/// the default rulebase.
fn write_deployment(dir: &TempDir) -> std::path::PathBuf {
    let rulebase = dir.path().join("interfaceRules");
    std::fs::create_dir_all(&rulebase).unwrap();
    std::fs::write(
        rulebase.join("Search.suggest.rule.json"),
        r#"{"response": {"words|3": ["w"]}, "responseError": {"code": 500}}"#,
    )
    .unwrap();
    std::fs::write(
        rulebase.join("Search.getNav.rule.json"),
        r#"{"response": "This is a mock text", "responseError": "This is a mock error"}"#,
    )
    .unwrap();

    let config = json!({
        "title": "gateway test",
        "version": "1.0.0",
        "status": "online",
        "interfaces": [
            {
                "name": "suggest words",
                "id": "Search.suggest",
                "urls": { "online": "http://suggest.example.com/sug" },
                "status": "mock"
            },
            {
                "id": "Search.getNav",
                "urls": { "online": "http://nav.example.com/nav" },
                "status": "mockerr",
                "isRuleStatic": true
            },
            {
                "id": "Search.list",
                "urls": { "online": "http://list.example.com/list" }
            },
            {
                "id": "Hidden.op",
                "urls": { "online": "http://hidden.example.com" },
                "intercepted": false
            },
            {
                "id": "broken id with spaces",
                "urls": { "online": "http://x" }
            }
        ]
    });
    let path = dir.path().join("interface.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn load_context(path: &Path, transport: Arc<dyn Transport>) -> Arc<GatewayContext> {
    let registry = ProfileRegistry::load_file(path).unwrap();
    Arc::new(GatewayContext::new(registry, transport))
}

fn get(path: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .uri(path)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn body_json(response: Response<Full<Bytes>>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn invalid_profiles_are_dropped_while_the_rest_load() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let ctx = load_context(&path, CannedTransport::new("{}"));

    let registry = ctx.registry();
    assert!(registry.is_profile_existed("Search.suggest"));
    assert!(!registry.is_profile_existed("broken id with spaces"));
    assert_eq!(registry.get_interface_ids_by_prefix("Search.").len(), 3);
}

#[tokio::test]
async fn mock_interface_never_contacts_the_transport() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let transport = CannedTransport::new("{}");
    let ctx = load_context(&path, transport.clone());

    let proxy = ctx.proxy("Search.suggest").unwrap();
    let body = proxy.request(&Params::None, None).await.unwrap();
    assert_eq!(body.as_json().unwrap()["words"], json!(["w", "w", "w"]));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn mockerr_interface_delivers_the_error_payload_as_a_success() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let ctx = load_context(&path, CannedTransport::new("{}"));

    let proxy = ctx.proxy("Search.getNav").unwrap();
    let body = proxy.request(&Params::None, None).await.unwrap();
    assert_eq!(body.as_json().unwrap(), &json!("This is a mock error"));
}

#[tokio::test]
async fn introspection_lists_exactly_the_admitted_ids_with_public_fields_only() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let dispatcher = Dispatcher::new(load_context(&path, CannedTransport::new("{}")));

    let response = dispatcher.dispatch(get(INTERFACES_PATH)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let listed = body_json(response).await;
    let map = listed.as_object().unwrap();
    let mut ids: Vec<&String> = map.keys().collect();
    ids.sort();
    assert_eq!(
        ids,
        ["Hidden.op", "Search.getNav", "Search.list", "Search.suggest"]
    );
    for descriptor in map.values() {
        let fields = descriptor.as_object().unwrap();
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();
        assert_eq!(keys, ["dataType", "id", "method"]);
    }
}

#[tokio::test]
async fn dispatcher_serves_live_interfaces_through_the_transport() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let transport = CannedTransport::new(r#"{"page": 1}"#);
    let dispatcher = Dispatcher::new(load_context(&path, transport.clone()));

    let response = dispatcher.dispatch(get("/Search.list?p=1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"page": 1}));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn dispatcher_hides_unknown_and_non_interceptable_interfaces() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let dispatcher = Dispatcher::new(load_context(&path, CannedTransport::new("{}")));

    let unknown = dispatcher.dispatch(get("/Search.what?q=a")).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let hidden = dispatcher.dispatch(get("/Hidden.op")).await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
    let bytes = hidden.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn aggregation_joins_mixed_mock_and_live_results_in_call_order() {
    let dir = TempDir::new().unwrap();
    let path = write_deployment(&dir);
    let transport = CannedTransport::new(r#"{"live": true}"#);
    let ctx = load_context(&path, transport.clone());

    let outcome = Aggregator::new(&ctx, &["Search.getNav", "Search.list"])
        .unwrap()
        .call("getNav", Params::None)
        .unwrap()
        .call("list", Params::map([("p", "1")]))
        .unwrap()
        .done()
        .await;

    match outcome {
        AggregateOutcome::Complete(results) => {
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].as_json().unwrap(), &json!("This is a mock error"));
            assert_eq!(results[1].as_json().unwrap(), &json!({"live": true}));
        }
        other => panic!("expected Complete, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1);
}
