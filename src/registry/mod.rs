//! Provider 注册表：标识符到适配器实例的绑定与当前活动 provider 的选择
//!
//! Provider registry. Maps string identifiers (`primary`, `enterprise`,
//! `local`, or anything a caller registers) to adapter instances, and tracks
//! which identifier is active.
//!
//! The active identifier comes from configuration and can be overridden with
//! [`ProviderRegistry::force_active`]. Forcing is a startup-time
//! administrative action: calls already in flight keep the adapter they
//! resolved.

use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::providers::{
    AzureAdapter, OllamaAdapter, OpenAiAdapter, ProviderAdapter, ENTERPRISE, LOCAL, PRIMARY,
};
use crate::transport::HttpTransport;
use crate::{Error, Result};

pub struct ProviderRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
    default_id: String,
    forced_id: ArcSwapOption<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("ids", &self.ids())
            .field("active", &self.active_id())
            .finish()
    }
}

impl ProviderRegistry {
    /// Empty registry whose active identifier defaults to `default_id`.
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
            default_id: default_id.into(),
            forced_id: ArcSwapOption::empty(),
        }
    }

    /// Registry with the three built-in adapters sharing one HTTP pool.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let transport = HttpTransport::new()?;
        let registry = Self::new(config.provider.clone());
        registry.register(
            PRIMARY,
            Arc::new(OpenAiAdapter::new(
                &config.openai,
                config.embedding_model.clone(),
                transport.clone(),
            )),
        );
        registry.register(
            ENTERPRISE,
            Arc::new(AzureAdapter::new(
                &config.azure,
                config.embedding_model.clone(),
                transport.clone(),
            )),
        );
        registry.register(LOCAL, Arc::new(OllamaAdapter::new(&config.ollama, transport)));
        Ok(registry)
    }

    /// Binds `id` to `adapter`; a later registration under the same id wins.
    pub fn register(&self, id: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        let id = id.into();
        let mut adapters = self.adapters.write().unwrap_or_else(|e| e.into_inner());
        if adapters.insert(id.clone(), adapter).is_some() {
            info!(provider = %id, "Replaced registered provider adapter");
        } else {
            debug!(provider = %id, "Registered provider adapter");
        }
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| Error::unregistered_provider(id))
    }

    pub fn resolve_active(&self) -> Result<Arc<dyn ProviderAdapter>> {
        self.resolve(&self.active_id())
    }

    /// Overrides the configured active identifier.
    ///
    /// The identifier does not need to be registered yet; resolution fails
    /// later if it never is.
    pub fn force_active(&self, id: impl Into<String>) {
        let id = id.into();
        info!(provider = %id, "Forcing active provider");
        self.forced_id.store(Some(Arc::new(id)));
    }

    pub fn clear_forced(&self) {
        self.forced_id.store(None);
    }

    pub fn active_id(&self) -> String {
        match self.forced_id.load_full() {
            Some(id) => id.as_ref().clone(),
            None => self.default_id.clone(),
        }
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .adapters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    #[test]
    fn built_in_adapters_are_registered() {
        let registry = ProviderRegistry::from_config(&GatewayConfig::default()).unwrap();
        assert_eq!(registry.ids(), vec!["enterprise", "local", "primary"]);
        assert_eq!(registry.active_id(), "primary");
        assert_eq!(registry.resolve_active().unwrap().provider_id(), "primary");
    }

    #[test]
    fn unknown_id_names_the_identifier() {
        let registry = ProviderRegistry::new("primary");
        let err = registry.resolve("mystery").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Configuration);
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn forcing_overrides_and_clears() {
        let registry = ProviderRegistry::from_config(&GatewayConfig::default()).unwrap();
        registry.force_active("local");
        assert_eq!(registry.resolve_active().unwrap().provider_id(), "local");
        registry.clear_forced();
        assert_eq!(registry.active_id(), "primary");
    }

    #[test]
    fn last_registration_wins() {
        let config = GatewayConfig::default();
        let transport = HttpTransport::new().unwrap();
        let registry = ProviderRegistry::new("x");
        registry.register("x", Arc::new(OllamaAdapter::new(&config.ollama, transport.clone())));
        registry.register(
            "x",
            Arc::new(OpenAiAdapter::new(&config.openai, "emb", transport)),
        );
        assert_eq!(registry.resolve("x").unwrap().provider_id(), "primary");
        assert_eq!(registry.ids().len(), 1);
    }
}
