use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::builder::DispatcherBuilder;
use crate::cache::{CacheKey, ResponseCache};
use crate::config::GatewayConfig;
use crate::error::FailureKind;
use crate::providers::{ChatRequest, ProviderAdapter, ProviderError};
use crate::registry::ProviderRegistry;
use crate::resilience::{BackoffState, Sleeper, WaitReason};
use crate::tokens;
use crate::types::{Conversation, Message, NormalizedResponse, RequestParameters};
use crate::{Error, Result};

/// One entry of [`Dispatcher::dispatch_batch`].
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub conversation: Conversation,
    pub parameters: RequestParameters,
}

/// Entry point for every text-generation and embedding call.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` and call it from
/// as many tasks as needed. Each call owns its retry state.
pub struct Dispatcher {
    pub(super) registry: Arc<ProviderRegistry>,
    pub(super) cache: ArcSwapOption<ResponseCache>,
    pub(super) sleeper: Arc<dyn Sleeper>,
    pub(super) batch_concurrency: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("cache", &self.cache.load().as_ref().map(|c| c.backend_name()))
            .field("batch_concurrency", &self.batch_concurrency)
            .finish()
    }
}

impl Dispatcher {
    pub fn builder(registry: Arc<ProviderRegistry>) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    /// Dispatcher over the built-in adapters, with the file cache attached
    /// when `cache.enabled` is set.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ProviderRegistry::from_config(config)?);
        registry.resolve_active()?;
        let mut builder = DispatcherBuilder::new(registry);
        if config.cache.enabled {
            builder = builder.cache(ResponseCache::file(config.cache.path.clone()));
        }
        Ok(builder.build())
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> Option<Arc<ResponseCache>> {
        self.cache.load_full()
    }

    /// Turns caching on or off.
    ///
    /// Enabling with a path opens a file cache there unless the current
    /// cache already uses that file; enabling without one keeps the current
    /// cache, or opens the default file. Startup-time action: calls already
    /// running keep the cache they started with, and two instances over the
    /// same file do not share a write lock.
    pub fn force_cache(&self, enabled: bool, path: Option<PathBuf>) {
        if !enabled {
            info!("Response cache disabled");
            self.cache.store(None);
            return;
        }
        match (path, self.cache.load_full()) {
            (Some(path), Some(current)) if current.path() == Some(path.as_path()) => {
                debug!(path = %path.display(), "Response cache already open");
            }
            (Some(path), _) => {
                info!(path = %path.display(), "Response cache enabled");
                self.cache.store(Some(Arc::new(ResponseCache::file(path))));
            }
            (None, Some(_)) => {}
            (None, None) => {
                let path = PathBuf::from(crate::config::DEFAULT_CACHE_FILE);
                info!(path = %path.display(), "Response cache enabled");
                self.cache.store(Some(Arc::new(ResponseCache::file(path))));
            }
        }
    }

    /// Sends the conversation to the active provider.
    pub async fn dispatch(
        &self,
        conversation: &[Message],
        parameters: &RequestParameters,
    ) -> Result<NormalizedResponse> {
        let provider = self.registry.active_id();
        self.dispatch_with(&provider, conversation, parameters).await
    }

    /// Sends the conversation to a specific registered provider.
    pub async fn dispatch_with(
        &self,
        provider: &str,
        conversation: &[Message],
        parameters: &RequestParameters,
    ) -> Result<NormalizedResponse> {
        parameters.validate()?;
        let adapter = self.registry.resolve(provider)?;
        self.run(provider, adapter.as_ref(), conversation, parameters)
            .await
    }

    /// Runs several independent calls with bounded concurrency.
    ///
    /// Results come back in request order.
    pub async fn dispatch_batch(
        &self,
        requests: Vec<BatchRequest>,
    ) -> Vec<Result<NormalizedResponse>> {
        futures::stream::iter(requests)
            .map(|req| async move { self.dispatch(&req.conversation, &req.parameters).await })
            .buffered(self.batch_concurrency)
            .collect()
            .await
    }

    /// Embeds `text` with the active provider.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.registry.active_id();
        let adapter = self.registry.resolve(&provider)?;
        adapter.embed(text).await.map_err(|e| {
            warn!(provider = %provider, error = %e, "Embedding failed");
            Error::from(e)
        })
    }

    async fn run(
        &self,
        provider: &str,
        adapter: &dyn ProviderAdapter,
        conversation: &[Message],
        parameters: &RequestParameters,
    ) -> Result<NormalizedResponse> {
        let model = adapter.resolve_model(&parameters.model);
        let cache = self.cache.load_full();

        let key = match &cache {
            Some(_) => Some(CacheKey::compute(&model, parameters, conversation)?),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&cache, &key) {
            match cache.get(key).await {
                Ok(Some(hit)) => {
                    info!(provider, model = %model, cache_key = %key, "Cache hit");
                    return Ok(hit);
                }
                Ok(None) => debug!(provider, model = %model, cache_key = %key, "Cache miss"),
                Err(e) => {
                    warn!(provider, cache_key = %key, error = %e, "Cache lookup failed, calling provider")
                }
            }
        }

        let request = ChatRequest {
            model: &model,
            messages: conversation,
            params: parameters,
        };
        let started = Instant::now();
        let mut backoff = BackoffState::new(parameters.waiting_time);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 1..=parameters.max_attempts {
            let wait = backoff.current();
            info!(
                provider,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Pacing before request"
            );
            self.sleeper.sleep(wait, WaitReason::Pacing).await;

            match tokens::estimate(conversation, &model) {
                Ok(n) => debug!(provider, model = %model, tokens = n, "Estimated prompt tokens"),
                Err(e) => debug!(provider, model = %model, "Token estimate unavailable: {}", e),
            }

            let err = match adapter.complete(&request).await {
                Ok(response) => {
                    debug!(
                        provider,
                        model = %model,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Provider answered"
                    );
                    if let (Some(cache), Some(key)) = (&cache, &key) {
                        if let Err(e) = cache.put(key, &response).await {
                            warn!(provider, cache_key = %key, error = %e, "Failed to persist response");
                        }
                    }
                    return Ok(response);
                }
                Err(err) => err,
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match err.kind() {
                FailureKind::InvalidRequest => {
                    error!(provider, model = %model, attempt, elapsed_ms, error = %err, "Invalid request");
                    return Err(Error::InvalidRequest {
                        provider: provider.to_string(),
                        attempt,
                        message: err.to_string(),
                    });
                }
                kind if kind.is_retryable() => {
                    warn!(
                        provider,
                        model = %model,
                        attempt,
                        elapsed_ms,
                        failure = %kind,
                        error = %err,
                        "Attempt failed"
                    );
                    if attempt < parameters.max_attempts {
                        info!(provider, attempt, wait_ms = wait.as_millis() as u64, "Backing off");
                        self.sleeper.sleep(wait, WaitReason::Backoff).await;
                        backoff.advance(parameters.backoff_factor);
                    }
                    last_error = Some(err);
                }
                kind => {
                    error!(provider, attempt, elapsed_ms, failure = %kind, error = %err, "Request cannot be served");
                    return Err(err.into());
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        error!(
            provider,
            model = %model,
            attempts = parameters.max_attempts,
            elapsed_ms,
            "Giving up after exhausting attempts"
        );
        Err(Error::AttemptsExhausted {
            attempts: parameters.max_attempts,
            elapsed_ms,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
