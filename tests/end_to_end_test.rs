//! zrpc End-to-End Tests
//!
//! Exercises the whole stack together: descriptors from the built-in catalog,
//! `ZrpcClient` over `HttpTransport`, the hyper `HttpServer`, the `Router` and
//! the metrics endpoints.
//!
//! Test Scenarios:
//! 1. Exact wire bytes for a `Target` and an empty `ListTargetsRequest`
//! 2. Echo dispatch returns the request unchanged, over HTTP and in-process
//! 3. Binary and JSON callers see the same response
//! 4. Unknown fields from a newer peer are dropped, not rejected
//! 5. Metrics reflect the calls that were made

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;
use zrpc::common::catalog::{self, action, echo};
use zrpc::common::codec::{json as json_codec, wire};
use zrpc::common::protocol::MapKey;
use zrpc::common::transport::CallOptions;
use zrpc::server::LocalTransport;
use zrpc::{
    Code, DescriptorPool, HttpServer, MessageValue, Router, ServiceImplementation,
    ServiceRegistry, Status, Value, ZrpcClient, ZrpcError,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn pool() -> Arc<DescriptorPool> {
    Arc::new(catalog::builtin_pool().unwrap())
}

/// The target used throughout: a webhook that interrupts on error.
fn webhook_target() -> MessageValue {
    MessageValue::new()
        .with("target_id", "t1")
        .with("name", "webhook-1")
        .with(
            "rest_webhook",
            MessageValue::new().with("interrupt_on_error", true),
        )
        .with("endpoint", "https://example.com/hook")
}

/// Every field kind the echo message has, set to a non-default value.
fn rich_echo() -> MessageValue {
    let mut labels = BTreeMap::new();
    labels.insert(MapKey::from("env"), Value::from("prod"));
    labels.insert(MapKey::from("team"), Value::from("iam"));

    let mut children = BTreeMap::new();
    children.insert(
        MapKey::from(7i64),
        Value::Message(MessageValue::new().with("string_value", "child")),
    );

    MessageValue::new()
        .with("int32_value", -5i32)
        .with("int64_value", i64::MIN)
        .with("uint32_value", u32::MAX)
        .with("uint64_value", u64::MAX)
        .with("sint32_value", -100i32)
        .with("sint64_value", -1_000_000_000_000i64)
        .with("fixed32_value", 7u32)
        .with("fixed64_value", 8u64)
        .with("sfixed32_value", -9i32)
        .with("sfixed64_value", -10i64)
        .with("bool_value", true)
        .with("string_value", "héllo")
        .with("bytes_value", vec![0u8, 1, 2, 255])
        .with("double_value", 1.5f64)
        .with("float_value", -2.25f32)
        .with("status", Value::Enum(2))
        .with("optional_int32", 0i32)
        .with("nested", MessageValue::new().with("bool_value", true))
        .with("int32_list", vec![Value::I32(1), Value::I32(-1), Value::I32(300)])
        .with("string_list", vec![Value::from("a"), Value::from("")])
        .with("unpacked_list", vec![Value::I64(-1), Value::I64(1)])
        .with("labels", labels)
        .with("children", children)
        .with("number", 42i64)
        .with("status_list", vec![Value::Enum(1), Value::Enum(99)])
}

fn action_service() -> ServiceImplementation {
    let mut implementation = ServiceImplementation::new();
    for (name, _, _) in action::METHODS {
        implementation = implementation.method(name, |_request, ctx| async move {
            Err(Status::unimplemented(format!("{} is not served here", ctx.path)))
        });
    }
    implementation.method("GetTargetByID", |request, _ctx| async move {
        match request.get_str("target_id") {
            Some("t1") => Ok(MessageValue::new().with("target", webhook_target())),
            Some(id) => Err(Status::new(Code::NotFound, format!("target {} not found", id))),
            None => Err(Status::invalid_argument("target_id is required")),
        }
    })
}

fn router(pool: &Arc<DescriptorPool>) -> Router {
    let mut registry = ServiceRegistry::new(Arc::clone(pool));
    registry
        .register_service(
            Arc::clone(pool.service(echo::SERVICE).unwrap()),
            zrpc::server::echo::implementation(),
        )
        .unwrap();
    registry
        .register_service(
            Arc::clone(pool.service(action::SERVICE).unwrap()),
            action_service(),
        )
        .unwrap();
    Router::new(registry)
}

/// Server on a random port, stopped when dropped
struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(pool: &Arc<DescriptorPool>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server = HttpServer::new(router(pool));
        tokio::spawn(async move {
            let signal = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(err) = server.serve_with_shutdown(listener, signal).await {
                eprintln!("Server error: {}", err);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Scenario 1: Exact Wire Bytes
// ============================================================================

#[test]
fn test_webhook_target_bytes() {
    let pool = pool();
    let desc = pool.message(action::TARGET).unwrap();

    let bytes = wire::encode(&pool, desc, &webhook_target()).unwrap();

    let mut expected = vec![0x0a, 0x02];
    expected.extend_from_slice(b"t1");
    expected.extend_from_slice(&[0x1a, 0x09]);
    expected.extend_from_slice(b"webhook-1");
    expected.extend_from_slice(&[0x22, 0x02, 0x08, 0x01]);
    expected.extend_from_slice(&[0x42, 0x18]);
    expected.extend_from_slice(b"https://example.com/hook");
    assert_eq!(bytes, expected);

    let decoded = wire::decode(&pool, desc, &bytes).unwrap();
    assert_eq!(decoded.get_str("target_id"), Some("t1"));
    assert_eq!(decoded.get_str("name"), Some("webhook-1"));
    assert_eq!(decoded.get_str("endpoint"), Some("https://example.com/hook"));
    assert_eq!(
        decoded
            .get_message("rest_webhook")
            .and_then(|webhook| webhook.get("interrupt_on_error"))
            .and_then(Value::as_bool),
        Some(true)
    );
    assert!(decoded.get("rest_call").is_none());
    assert!(decoded.get("rest_async").is_none());
}

#[test]
fn test_empty_list_targets_request() {
    let pool = pool();
    let desc = pool
        .message("zitadel.action.v3alpha.ListTargetsRequest")
        .unwrap();
    let request = MessageValue::new()
        .with("queries", Vec::<Value>::new())
        .with("sorting_column", Value::Enum(0));

    let bytes = wire::encode(&pool, desc, &request).unwrap();
    assert!(bytes.is_empty());

    let decoded = wire::decode(&pool, desc, &bytes).unwrap();
    assert!(decoded.get("query").is_none());
    assert_eq!(decoded.get("sorting_column"), Some(&Value::Enum(0)));
    assert_eq!(decoded.get("queries"), Some(&Value::List(Vec::new())));
}

#[test]
fn test_rich_echo_roundtrips_through_both_codecs() {
    let pool = pool();
    let desc = pool.message(echo::ECHO_MESSAGE).unwrap();
    let value = rich_echo();
    let expected = value.normalized(&pool, desc).unwrap();

    let bytes = wire::encode(&pool, desc, &value).unwrap();
    assert_eq!(wire::decode(&pool, desc, &bytes).unwrap(), expected);

    let json = json_codec::to_json(&pool, desc, &value).unwrap();
    let back = json_codec::from_json(&pool, desc, &json).unwrap();
    assert_eq!(back.normalized(&pool, desc).unwrap(), expected);

    // re-encoding what was decoded gives the same bytes
    let again = wire::encode(&pool, desc, &expected).unwrap();
    assert_eq!(wire::decode(&pool, desc, &again).unwrap(), expected);
}

// ============================================================================
// Scenario 2: Echo Dispatch
// ============================================================================

#[tokio::test]
async fn test_echo_over_http_returns_request() {
    let pool = pool();
    let server = TestServer::start(&pool).await;
    let client = ZrpcClient::http(&server.base_url, Arc::clone(&pool));

    let sample = rich_echo();
    let reply = client
        .service(echo::SERVICE)
        .unwrap()
        .call("Echo", &sample)
        .await
        .unwrap();

    let desc = pool.message(echo::ECHO_MESSAGE).unwrap();
    assert_eq!(reply, sample.normalized(&pool, desc).unwrap());
}

#[tokio::test]
async fn test_local_and_http_transports_agree() {
    let pool = pool();
    let server = TestServer::start(&pool).await;
    let remote = ZrpcClient::http(&server.base_url, Arc::clone(&pool));
    let local = ZrpcClient::new(
        LocalTransport::new(Arc::new(router(&pool))),
        Arc::clone(&pool),
    );

    let request = MessageValue::new().with("target_id", "t1");
    let over_http = remote
        .invoke_path(
            "/zitadel.action.v3alpha.ActionService/GetTargetByID",
            &request,
            CallOptions::new(),
        )
        .await
        .unwrap();
    let in_process = local
        .invoke_path(
            "/zitadel.action.v3alpha.ActionService/GetTargetByID",
            &request,
            CallOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(over_http, in_process);
    let target = over_http.get_message("target").unwrap();
    assert_eq!(target.get_str("name"), Some("webhook-1"));
}

#[tokio::test]
async fn test_concurrent_http_invokes() {
    let pool = pool();
    let server = TestServer::start(&pool).await;
    let client = ZrpcClient::http(&server.base_url, Arc::clone(&pool));

    let mut tasks = Vec::new();
    for i in 0..32i64 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let service = client.service(echo::SERVICE).unwrap();
            let reply = service
                .call("Echo", &MessageValue::new().with("int64_value", i))
                .await
                .unwrap();
            (i, reply.get("int64_value").and_then(Value::as_i64))
        }));
    }

    for task in tasks {
        let (sent, received) = task.await.unwrap();
        assert_eq!(received, Some(sent));
    }
}

#[tokio::test]
async fn test_handler_status_over_http() {
    let pool = pool();
    let server = TestServer::start(&pool).await;
    let client = ZrpcClient::http(&server.base_url, Arc::clone(&pool));

    let err = client
        .service(action::SERVICE)
        .unwrap()
        .call("GetTargetByID", &MessageValue::new().with("target_id", "t2"))
        .await
        .unwrap_err();
    match err {
        ZrpcError::Status(status) => {
            assert_eq!(status.code, Code::NotFound);
            assert_eq!(status.message, "target t2 not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Scenario 3: Binary and JSON Callers
// ============================================================================

#[tokio::test]
async fn test_json_caller_sees_canonical_json() {
    let pool = pool();
    let server = TestServer::start(&pool).await;

    let response = reqwest::Client::new()
        .post(server.url("/zitadel.action.v3alpha.ActionService/GetTargetByID"))
        .header("content-type", "application/json")
        .body(r#"{"targetId":"t1"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: JsonValue = response.json().await.unwrap();

    assert_eq!(
        body,
        json!({
            "target": {
                "targetId": "t1",
                "name": "webhook-1",
                "restWebhook": {"interruptOnError": true},
                "endpoint": "https://example.com/hook"
            }
        })
    );
}

// ============================================================================
// Scenario 4: Forward Compatibility
// ============================================================================

#[tokio::test]
async fn test_unknown_fields_from_newer_peer_are_dropped() {
    let pool = pool();
    let server = TestServer::start(&pool).await;

    // string_value = "hi", then field 99 (varint) and field 100 (bytes) unknown here
    let known = b"\x62\x02hi".to_vec();
    let mut body = known.clone();
    body.extend_from_slice(&[0x98, 0x06, 0x2a]);
    body.extend_from_slice(&[0xa2, 0x06, 0x03, b'x', b'y', b'z']);

    let response = reqwest::Client::new()
        .post(server.url(echo::ECHO_PATH))
        .header("content-type", "application/proto")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), known.as_slice());
}

// ============================================================================
// Scenario 5: Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_reflect_calls() {
    let pool = pool();
    let server = TestServer::start(&pool).await;
    let client = ZrpcClient::http(&server.base_url, Arc::clone(&pool));
    let targets = client.service(action::SERVICE).unwrap();

    for id in ["t1", "t1", "missing"] {
        let _ = targets
            .call("GetTargetByID", &MessageValue::new().with("target_id", id))
            .await;
    }

    let metrics: JsonValue = reqwest::get(server.url("/_metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["total_requests"], 3);
    assert_eq!(metrics["successful_requests"], 2);
    assert_eq!(metrics["failed_requests"], 1);

    let method = &metrics["methods"]["/zitadel.action.v3alpha.ActionService/GetTargetByID"];
    assert_eq!(method["call_count"], 3);
    assert_eq!(method["failures_by_code"]["not_found"], 1);

    let info: JsonValue = reqwest::get(server.url("/_info"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["services"], json!([action::SERVICE, echo::SERVICE]));
}
