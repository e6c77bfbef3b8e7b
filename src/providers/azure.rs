//! Azure OpenAI adapter (`enterprise`).
//!
//! Same body and reply format as the hosted API; differs in how the URL is
//! built (per-deployment, with an `api-version` query) and in using an
//! `api-key` header instead of a bearer token.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::AzureSettings;
use crate::transport::HttpTransport;
use crate::types::params::DEFAULT_TIMEOUT;
use crate::types::NormalizedResponse;

use super::openai::{chat_body, extract_chat, extract_embedding};
use super::{ApiKey, ChatRequest, ProviderAdapter, ProviderError, WireRequest, ENTERPRISE};

#[derive(Debug, Clone)]
pub struct AzureAdapter {
    endpoint: Option<String>,
    api_key: Option<ApiKey>,
    api_version: String,
    embedding_deployment: String,
    transport: HttpTransport,
}

impl AzureAdapter {
    pub fn new(
        settings: &AzureSettings,
        embedding_model: impl Into<String>,
        transport: HttpTransport,
    ) -> Self {
        Self {
            endpoint: settings
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
            api_key: settings.api_key.clone(),
            api_version: settings.api_version.clone(),
            embedding_deployment: settings
                .embedding_deployment
                .clone()
                .unwrap_or_else(|| embedding_model.into()),
            transport,
        }
    }

    fn missing(setting: &'static str) -> ProviderError {
        ProviderError::MissingCredential {
            provider: ENTERPRISE.to_string(),
            setting,
        }
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> Result<String, ProviderError> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| Self::missing("azure.endpoint"))?;
        Ok(format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            endpoint, deployment, operation, self.api_version
        ))
    }

    fn headers(&self) -> Result<Vec<(String, String)>, ProviderError> {
        let key = self.api_key.as_ref().ok_or_else(|| Self::missing("azure.api_key"))?;
        Ok(vec![("api-key".to_string(), key.expose().to_string())])
    }
}

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn provider_id(&self) -> &str {
        ENTERPRISE
    }

    fn build_wire_request(&self, request: &ChatRequest<'_>) -> Result<WireRequest, ProviderError> {
        Ok(WireRequest {
            url: self.deployment_url(request.model, "chat/completions")?,
            headers: self.headers()?,
            body: chat_body(request),
            timeout: request.params.timeout,
        })
    }

    async fn invoke(&self, wire: &WireRequest) -> Result<Value, ProviderError> {
        self.transport.post_json(wire).await
    }

    fn extract(&self, model: &str, raw: Value) -> Result<NormalizedResponse, ProviderError> {
        extract_chat(model, raw)
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let wire = WireRequest {
            url: self.deployment_url(&self.embedding_deployment, "embeddings")?,
            headers: self.headers()?,
            body: json!({ "input": [text], "model": self.embedding_deployment }),
            timeout: DEFAULT_TIMEOUT,
        };
        let raw = self.transport.post_json(&wire).await?;
        extract_embedding(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, RequestParameters};

    fn settings(endpoint: Option<&str>) -> AzureSettings {
        AzureSettings {
            endpoint: endpoint.map(String::from),
            api_key: Some(ApiKey::new("az-key")),
            api_version: "2024-02-01".to_string(),
            embedding_deployment: None,
        }
    }

    #[test]
    fn url_is_per_deployment() {
        let a = AzureAdapter::new(
            &settings(Some("https://contoso.openai.azure.com/")),
            "text-embedding-3-small",
            HttpTransport::new().unwrap(),
        );
        let params = RequestParameters::new("gpt-4o");
        let messages = vec![Message::user("Hello")];
        let wire = a
            .build_wire_request(&ChatRequest { model: "gpt-4o", messages: &messages, params: &params })
            .unwrap();
        assert_eq!(
            wire.url,
            "https://contoso.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(wire.headers, vec![("api-key".to_string(), "az-key".to_string())]);
        assert_eq!(wire.body["model"], "gpt-4o");
    }

    #[test]
    fn missing_endpoint_is_credential_error() {
        let a = AzureAdapter::new(&settings(None), "emb", HttpTransport::new().unwrap());
        let params = RequestParameters::default();
        let err = a
            .build_wire_request(&ChatRequest { model: "gpt-4", messages: &[], params: &params })
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential { setting: "azure.endpoint", .. }));
    }

    #[tokio::test]
    async fn embeddings_use_embedding_deployment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/deployments/text-embedding-3-small/embeddings")
            .match_query(mockito::Matcher::UrlEncoded("api-version".into(), "2024-02-01".into()))
            .match_header("api-key", "az-key")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[1.0,2.0]}]}"#)
            .create_async()
            .await;

        let a = AzureAdapter::new(
            &settings(Some(&server.url())),
            "text-embedding-3-small",
            HttpTransport::new().unwrap(),
        );
        assert_eq!(a.embed("hi").await.unwrap(), vec![1.0, 2.0]);
        mock.assert_async().await;
    }
}
