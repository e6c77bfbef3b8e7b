//! End-to-end dispatch through the built-in adapters against a local mock
//! HTTP server.

use std::sync::Arc;
use std::time::Duration;

use llm_gateway::cache::ResponseCache;
use llm_gateway::config::{AzureSettings, GatewayConfig, OllamaSettings, OpenAiSettings};
use llm_gateway::providers::{ApiKey, AzureAdapter, OllamaAdapter, OpenAiAdapter, ResponseShape};
use llm_gateway::resilience::{RecordingSleeper, WaitReason};
use llm_gateway::transport::HttpTransport;
use llm_gateway::{
    Dispatcher, Error, FailureKind, Message, ProviderRegistry, RequestParameters, ResponseContent,
};
use mockito::Matcher;

const CHAT_OK: &str = r#"{
    "id": "chatcmpl-1",
    "model": "m1",
    "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
    "usage": {"prompt_tokens": 8, "completion_tokens": 2, "total_tokens": 10}
}"#;

fn dispatcher_for(id: &str, adapter: Arc<dyn llm_gateway::providers::ProviderAdapter>) -> (Dispatcher, Arc<RecordingSleeper>) {
    let registry = Arc::new(ProviderRegistry::new(id));
    registry.register(id, adapter);
    let sleeper = Arc::new(RecordingSleeper::new());
    let dispatcher = Dispatcher::builder(registry)
        .cache(ResponseCache::memory())
        .sleeper(sleeper.clone())
        .build();
    (dispatcher, sleeper)
}

fn openai(base_url: &str) -> Arc<OpenAiAdapter> {
    let settings = OpenAiSettings {
        base_url: base_url.to_string(),
        api_key: Some(ApiKey::new("sk-test")),
    };
    Arc::new(OpenAiAdapter::new(
        &settings,
        "text-embedding-3-small",
        HttpTransport::new().unwrap(),
    ))
}

fn params() -> RequestParameters {
    RequestParameters::new("m1")
        .with_max_attempts(3)
        .with_backoff(Duration::from_secs(1), 2.0)
}

#[tokio::test]
async fn primary_recovers_from_http_429() {
    let mut server = mockito::Server::new_async().await;
    let throttled = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "1")
        .with_body(r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "Hello"}],
            "stream": false
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CHAT_OK)
        .expect(1)
        .create_async()
        .await;

    let (dispatcher, sleeper) = dispatcher_for("primary", openai(&server.url()));
    let response = dispatcher
        .dispatch(&[Message::user("Hello")], &params())
        .await
        .unwrap();

    assert_eq!(response.text_content(), Some("Hi there"));
    assert_eq!(response.usage.as_ref().map(|u| u.total_tokens), Some(10));
    assert_eq!(sleeper.waits_for(WaitReason::Backoff), vec![Duration::from_secs(1)]);
    assert_eq!(dispatcher.cache().unwrap().len().await.unwrap(), 1);
    throttled.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn enterprise_invalid_request_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/deployments/m1/chat/completions")
        .match_query(Matcher::UrlEncoded("api-version".into(), "2023-05-15".into()))
        .match_header("api-key", "az-key")
        .with_status(400)
        .with_body(r#"{"error":{"code":"context_length_exceeded","message":"Too many tokens"}}"#)
        .expect(1)
        .create_async()
        .await;

    let settings = AzureSettings {
        endpoint: Some(server.url()),
        api_key: Some(ApiKey::new("az-key")),
        ..AzureSettings::default()
    };
    let adapter = Arc::new(AzureAdapter::new(&settings, "emb", HttpTransport::new().unwrap()));
    let (dispatcher, sleeper) = dispatcher_for("enterprise", adapter);

    let err = dispatcher
        .dispatch(&[Message::user("Hello")], &params())
        .await
        .unwrap_err();
    match &err {
        Error::InvalidRequest { provider, attempt, message } => {
            assert_eq!(provider, "enterprise");
            assert_eq!(*attempt, 1);
            assert!(message.contains("Too many tokens"));
        }
        other => panic!("expected invalid request, got {other:?}"),
    }
    assert!(sleeper.waits_for(WaitReason::Backoff).is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_exhaust_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body(r#"{"error":{"message":"The engine is currently overloaded"}}"#)
        .expect(3)
        .create_async()
        .await;

    let (dispatcher, sleeper) = dispatcher_for("primary", openai(&server.url()));
    let err = dispatcher
        .dispatch(&[Message::user("Hello")], &params())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::AttemptsExhausted);
    assert!(err.to_string().contains("overloaded"));
    assert_eq!(
        sleeper.waits_for(WaitReason::Backoff),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(dispatcher.cache().unwrap().len().await.unwrap(), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn timeouts_are_transient_and_consume_an_attempt() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let (dispatcher, sleeper) = dispatcher_for("primary", openai(&format!("http://{addr}")));
    let params = RequestParameters::new("m1")
        .with_max_attempts(2)
        .with_backoff(Duration::from_millis(1), 2.0)
        .with_timeout(Duration::from_millis(200));

    let err = dispatcher
        .dispatch(&[Message::user("Hello")], &params)
        .await
        .unwrap_err();

    match &err {
        Error::AttemptsExhausted { attempts, last_error, .. } => {
            assert_eq!(*attempts, 2);
            assert!(last_error.contains("timed out"), "{last_error}");
        }
        other => panic!("expected exhausted attempts, got {other:?}"),
    }
    assert_eq!(sleeper.waits_for(WaitReason::Backoff), vec![Duration::from_millis(1)]);
    assert_eq!(dispatcher.cache().unwrap().len().await.unwrap(), 0);
}

#[tokio::test]
async fn local_adapter_builds_envelope_and_uses_configured_model() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "llama3.1",
            "stream": false,
            "options": {"num_predict": 1024}
        })))
        .with_status(200)
        .with_body(r#"{"model":"llama3.1","message":{"role":"assistant","content":"Nice to meet you"},"done":true,"done_reason":"stop"}"#)
        .create_async()
        .await;

    let settings = OllamaSettings {
        base_url: server.url(),
        model: Some("llama3.1".to_string()),
        response_shape: ResponseShape::CognitiveEnvelope,
        ..OllamaSettings::default()
    };
    let adapter = Arc::new(OllamaAdapter::new(&settings, HttpTransport::new().unwrap()));
    let (dispatcher, _) = dispatcher_for("local", adapter);

    let response = dispatcher
        .dispatch(&[Message::user("Hello")], &params().with_samples(2))
        .await
        .unwrap();

    assert_eq!(response.model, "llama3.1");
    match response.content {
        ResponseContent::Structured(envelope) => {
            assert_eq!(envelope["actions"][0]["content"], "Nice to meet you");
            assert!(envelope.get("cognitive_state").is_some());
        }
        other => panic!("expected structured envelope, got {other:?}"),
    }
    assert!(dispatcher.embed("x").await.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn built_in_registry_reports_missing_credentials() {
    let config = GatewayConfig::default();
    let dispatcher = Dispatcher::builder(Arc::new(ProviderRegistry::from_config(&config).unwrap()))
        .sleeper(Arc::new(RecordingSleeper::new()))
        .build();

    let err = dispatcher
        .dispatch_with("enterprise", &[Message::user("Hello")], &params())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Configuration);
    assert_eq!(
        err.context().and_then(|c| c.field_path.as_deref()),
        Some("azure.endpoint")
    );
}
