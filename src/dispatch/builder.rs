use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::engine::Dispatcher;
use crate::cache::ResponseCache;
use crate::registry::ProviderRegistry;
use crate::resilience::{Sleeper, TokioSleeper};

/// Builder for [`Dispatcher`].
///
/// Without further calls the dispatcher has no cache and sleeps on the tokio
/// timer.
pub struct DispatcherBuilder {
    registry: Arc<ProviderRegistry>,
    cache: Option<ResponseCache>,
    sleeper: Arc<dyn Sleeper>,
    batch_concurrency: Option<usize>,
}

impl DispatcherBuilder {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            cache: None,
            sleeper: Arc::new(TokioSleeper),
            batch_concurrency: None,
        }
    }

    /// Attach a response cache.
    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the sleeper used for pacing and backoff waits.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Maximum number of calls [`Dispatcher::dispatch_batch`] runs at once.
    ///
    /// Defaults to `LLM_GATEWAY_BATCH_CONCURRENCY`, or 4.
    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.batch_concurrency = Some(n.max(1));
        self
    }

    pub fn build(self) -> Dispatcher {
        let batch_concurrency = self.batch_concurrency.unwrap_or_else(|| {
            std::env::var("LLM_GATEWAY_BATCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(4)
        });
        Dispatcher {
            registry: self.registry,
            cache: ArcSwapOption::new(self.cache.map(Arc::new)),
            sleeper: self.sleeper,
            batch_concurrency,
        }
    }
}
