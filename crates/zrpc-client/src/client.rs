use std::sync::Arc;

use bytes::Bytes;
use zrpc_common::codec::{validate, Codec};
use zrpc_common::protocol::descriptor::split_method_path;
use zrpc_common::protocol::{
    DescriptorPool, MessageValue, MethodDescriptor, Result, ServiceDescriptor, ZrpcError,
};
use zrpc_common::transport::{CallOptions, HttpTransport, Transport};

use crate::config::ClientConfig;

/// zrpc client for making unary calls
///
/// Validates and encodes requests against the descriptor pool, hands the bytes
/// to a [`Transport`] and decodes the response. Cloning is cheap; clones share
/// the transport and pool, and concurrent calls never wait on each other.
#[derive(Clone)]
pub struct ZrpcClient {
    transport: Arc<dyn Transport>,
    codec: Codec,
    config: ClientConfig,
}

impl ZrpcClient {
    /// Create a client over any transport
    pub fn new(transport: impl Transport + 'static, pool: Arc<DescriptorPool>) -> Self {
        Self::with_transport(Arc::new(transport), pool)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, pool: Arc<DescriptorPool>) -> Self {
        Self {
            transport,
            codec: Codec::proto(pool),
            config: ClientConfig::default(),
        }
    }

    /// Create a client that talks to `base_url` over HTTP
    pub fn http(base_url: impl Into<String>, pool: Arc<DescriptorPool>) -> Self {
        Self::new(HttpTransport::new(base_url), pool)
    }

    /// Replace the configuration after validating it
    pub fn with_config(mut self, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<DescriptorPool> {
        self.codec.pool()
    }

    /// Call `method` of `service`
    ///
    /// # Errors
    ///
    /// - [`ZrpcError::UnknownMethod`] when the service does not declare `method`
    /// - [`ZrpcError::InvalidRequest`] when the request does not fit the input type
    /// - [`ZrpcError::MalformedWireData`] when the response bytes do not decode
    /// - [`ZrpcError::Status`] when the remote side reports a failure
    pub async fn invoke(
        &self,
        service: &ServiceDescriptor,
        method: &str,
        request: &MessageValue,
        options: CallOptions,
    ) -> Result<MessageValue> {
        let descriptor = service.method(method).ok_or_else(|| ZrpcError::UnknownMethod {
            service: service.full_name().to_string(),
            method: method.to_string(),
        })?;
        self.invoke_method(descriptor, request, options).await
    }

    /// Call the method at `/<package>.<Service>/<Method>`, resolved from the pool
    pub async fn invoke_path(
        &self,
        path: &str,
        request: &MessageValue,
        options: CallOptions,
    ) -> Result<MessageValue> {
        let Some((service, method)) = split_method_path(path) else {
            return Err(ZrpcError::InvalidRequest(format!(
                "`{}` is not a method path",
                path
            )));
        };
        let service = self.pool().service(service).cloned().ok_or_else(|| {
            ZrpcError::UnknownMethod {
                service: service.to_string(),
                method: method.to_string(),
            }
        })?;
        self.invoke(&service, method, request, options).await
    }

    async fn invoke_method(
        &self,
        method: &MethodDescriptor,
        request: &MessageValue,
        mut options: CallOptions,
    ) -> Result<MessageValue> {
        let pool = self.pool();
        let input = pool.message(method.input_type())?;
        validate::check(pool, input, request, self.config.strict)?;

        let body = self
            .codec
            .encode_message(method.input_type(), request)
            .map_err(|err| match err {
                ZrpcError::SchemaViolation(msg) | ZrpcError::MalformedWireData(msg) => {
                    ZrpcError::InvalidRequest(msg)
                }
                other => other,
            })?;

        if options.timeout.is_none() {
            options.timeout = self.config.default_timeout;
        }

        tracing::debug!(path = method.path(), bytes = body.len(), "Sending request");
        let response = self
            .transport
            .call(method.path(), Bytes::from(body), &options)
            .await?;

        self.codec.decode_message(method.output_type(), &response)
    }

    /// Handle bound to one service of the pool
    pub fn service(&self, full_name: &str) -> Result<ServiceClient> {
        let service = self.pool().service(full_name).cloned().ok_or_else(|| {
            ZrpcError::InvalidDescriptor(format!("service {} is not declared", full_name))
        })?;
        Ok(ServiceClient {
            client: self.clone(),
            service,
        })
    }
}

impl std::fmt::Debug for ZrpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZrpcClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Client for the methods of a single service
#[derive(Clone, Debug)]
pub struct ServiceClient {
    client: ZrpcClient,
    service: Arc<ServiceDescriptor>,
}

impl ServiceClient {
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub async fn call(&self, method: &str, request: &MessageValue) -> Result<MessageValue> {
        self.call_with(method, request, CallOptions::default()).await
    }

    pub async fn call_with(
        &self,
        method: &str,
        request: &MessageValue,
        options: CallOptions,
    ) -> Result<MessageValue> {
        self.client
            .invoke(&self.service, method, request, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use zrpc_common::catalog::{self, action, echo};
    use zrpc_common::protocol::{Code, Status};

    /// Records every call and answers with a fixed result
    struct MockTransport {
        calls: Mutex<Vec<(String, Bytes, CallOptions)>>,
        response: std::result::Result<Bytes, Status>,
    }

    impl MockTransport {
        fn answering(response: std::result::Result<Bytes, Status>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                response,
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn call(&self, path: &str, request: Bytes, options: &CallOptions) -> Result<Bytes> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_string(), request, options.clone()));
            self.response.clone().map_err(ZrpcError::Status)
        }
    }

    fn client(transport: Arc<MockTransport>) -> ZrpcClient {
        ZrpcClient::with_transport(transport, Arc::new(catalog::builtin_pool().unwrap()))
    }

    #[tokio::test]
    async fn test_invoke_sends_encoded_request_to_method_path() {
        let transport = MockTransport::answering(Ok(Bytes::from_static(b"\x62\x02ok")));
        let client = client(Arc::clone(&transport));

        let response = client
            .invoke_path(
                echo::ECHO_PATH,
                &MessageValue::new().with("string_value", "hi"),
                CallOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.get_str("string_value"), Some("ok"));

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, echo::ECHO_PATH);
        assert_eq!(calls[0].1.as_ref(), b"\x62\x02hi");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let transport = MockTransport::answering(Ok(Bytes::new()));
        let client = client(Arc::clone(&transport));
        let service = client.service(action::SERVICE).unwrap();

        let err = service
            .call("DropAllTargets", &MessageValue::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ZrpcError::UnknownMethod { ref method, .. } if method == "DropAllTargets"));
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_unknown_fields() {
        let transport = MockTransport::answering(Ok(Bytes::new()));
        let request = MessageValue::new()
            .with("string_value", "hi")
            .with("no_such_field", 1i32);

        let lenient = client(Arc::clone(&transport));
        lenient
            .invoke_path(echo::ECHO_PATH, &request, CallOptions::new())
            .await
            .unwrap();

        let strict = client(Arc::clone(&transport))
            .with_config(ClientConfig::new().strict(true))
            .unwrap();
        let err = strict
            .invoke_path(echo::ECHO_PATH, &request, CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ZrpcError::InvalidRequest(_)));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_invalid_request() {
        let transport = MockTransport::answering(Ok(Bytes::new()));
        let client = client(transport);
        let request = MessageValue::new().with("bool_value", "yes");

        let err = client
            .invoke_path(echo::ECHO_PATH, &request, CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ZrpcError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_remote_status_is_returned() {
        let transport =
            MockTransport::answering(Err(Status::new(Code::NotFound, "target t9 not found")));
        let client = client(transport);

        let err = client
            .service(action::SERVICE)
            .unwrap()
            .call("GetTargetByID", &MessageValue::new().with("target_id", "t9"))
            .await
            .unwrap_err();
        match err {
            ZrpcError::Status(status) => {
                assert_eq!(status.code, Code::NotFound);
                assert_eq!(status.message, "target t9 not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let transport = MockTransport::answering(Ok(Bytes::from_static(b"\x62\x05a")));
        let client = client(transport);

        let err = client
            .invoke_path(echo::ECHO_PATH, &MessageValue::new(), CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ZrpcError::MalformedWireData(_)));
    }

    #[tokio::test]
    async fn test_default_timeout_fills_options() {
        let transport = MockTransport::answering(Ok(Bytes::new()));
        let client = client(Arc::clone(&transport))
            .with_config(ClientConfig::new().with_default_timeout(Duration::from_secs(2)))
            .unwrap();

        client
            .invoke_path(echo::ECHO_PATH, &MessageValue::new(), CallOptions::new())
            .await
            .unwrap();
        let explicit = CallOptions::new().with_timeout(Duration::from_millis(250));
        client
            .invoke_path(echo::ECHO_PATH, &MessageValue::new(), explicit)
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].2.timeout, Some(Duration::from_secs(2)));
        assert_eq!(calls[1].2.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unknown_service() {
        let client = client(MockTransport::answering(Ok(Bytes::new())));
        assert!(matches!(
            client.service("zitadel.nothing.v1.NothingService"),
            Err(ZrpcError::InvalidDescriptor(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_path() {
        let client = client(MockTransport::answering(Ok(Bytes::new())));
        let err = client
            .invoke_path("no-slashes", &MessageValue::new(), CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ZrpcError::InvalidRequest(_)));
    }
}
