//! Cross-provider model resolution.
//!
//! When failover moves a request to a provider other than the one the
//! requested model belongs to, the model identifier has to be translated:
//!
//! 1. Infer the model's native provider from its name prefix (unmatched
//!    names belong to the primary provider).
//! 2. Same provider as the target → keep the model.
//! 3. Otherwise an exact `(model, target)` crossover entry, else the
//!    target provider's default model.
//!
//! The table is a versioned [`RoutingConfig`] and can be swapped at runtime
//! with [`ModelResolver::replace_table`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::config::RoutingConfig;

/// Pre-indexed view of a [`RoutingConfig`].
#[derive(Debug)]
struct ResolverTable {
    version: String,
    primary_provider: String,
    /// `(prefix, provider)` in declared provider order.
    prefixes: Vec<(String, String)>,
    defaults: HashMap<String, String>,
    /// `(from, target provider) → to`.
    crossover: HashMap<(String, String), String>,
}

impl ResolverTable {
    fn build(config: &RoutingConfig) -> Self {
        let prefixes = config
            .providers
            .iter()
            .flat_map(|p| {
                p.model_prefixes
                    .iter()
                    .map(move |prefix| (prefix.clone(), p.name.clone()))
            })
            .collect();
        let defaults = config
            .providers
            .iter()
            .map(|p| (p.name.clone(), p.default_model.clone()))
            .collect();
        let mut crossover = HashMap::new();
        for entry in &config.crossover {
            // First entry wins on duplicates.
            crossover
                .entry((entry.from.clone(), entry.provider.clone()))
                .or_insert_with(|| entry.to.clone());
        }
        Self {
            version: config.version.clone(),
            primary_provider: config.primary_provider.clone(),
            prefixes,
            defaults,
            crossover,
        }
    }

    fn native_provider<'a>(&'a self, model: &str) -> &'a str {
        self.prefixes
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map_or(self.primary_provider.as_str(), |(_, provider)| {
                provider.as_str()
            })
    }
}

/// Maps a requested model onto an equivalent model for a target provider.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    table: Arc<RwLock<Arc<ResolverTable>>>,
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl ModelResolver {
    /// Build a resolver from `config`.
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            table: Arc::new(RwLock::new(Arc::new(ResolverTable::build(config)))),
        }
    }

    fn current(&self) -> Arc<ResolverTable> {
        Arc::clone(&self.table.read())
    }

    /// Provider a model name natively belongs to.
    pub fn native_provider(&self, model: &str) -> String {
        self.current().native_provider(model).to_string()
    }

    /// Model to send to `target_provider` for a request that asked for
    /// `requested_model`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_ai_governance::ModelResolver;
    /// let r = ModelResolver::default();
    /// assert_eq!(r.resolve("anthropic", "gpt-4o-mini"), "claude-3-5-haiku-latest");
    /// assert_eq!(r.resolve("openai", "gpt-4o-mini"), "gpt-4o-mini");
    /// ```
    pub fn resolve(&self, target_provider: &str, requested_model: &str) -> String {
        let table = self.current();

        if table.native_provider(requested_model) == target_provider {
            return requested_model.to_string();
        }

        let key = (requested_model.to_string(), target_provider.to_string());
        if let Some(mapped) = table.crossover.get(&key) {
            return mapped.clone();
        }

        match table.defaults.get(target_provider) {
            Some(default_model) => default_model.clone(),
            None => {
                warn!(
                    provider = %target_provider,
                    model = %requested_model,
                    table_version = %table.version,
                    "no default model for provider; passing model through"
                );
                requested_model.to_string()
            }
        }
    }

    /// Atomically swap in a new table. In-flight `resolve` calls finish on
    /// the table they started with.
    pub fn replace_table(&self, config: &RoutingConfig) {
        let next = Arc::new(ResolverTable::build(config));
        let previous = {
            let mut guard = self.table.write();
            std::mem::replace(&mut *guard, next)
        };
        info!(
            from_version = %previous.version,
            to_version = %config.version,
            "crossover table replaced"
        );
    }

    /// Version tag of the active table.
    pub fn table_version(&self) -> String {
        self.current().version.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::config::{CrossoverEntry, ProviderConfig};

    #[test]
    fn test_native_provider_by_prefix() {
        let r = ModelResolver::default();
        assert_eq!(r.native_provider("claude-3-opus"), "anthropic");
        assert_eq!(r.native_provider("gpt-4o"), "openai");
        assert_eq!(r.native_provider("some-unknown-model"), "openai");
    }

    #[test]
    fn test_same_provider_returns_model_unchanged() {
        let r = ModelResolver::default();
        assert_eq!(r.resolve("anthropic", "claude-3-opus"), "claude-3-opus");
        assert_eq!(r.resolve("openai", "gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_crossover_preserves_tier() {
        let r = ModelResolver::default();
        assert_eq!(r.resolve("anthropic", "gpt-4o"), "claude-3-5-sonnet-latest");
        assert_eq!(r.resolve("anthropic", "gpt-4o-mini"), "claude-3-5-haiku-latest");
        assert_eq!(r.resolve("openai", "claude-3-5-haiku-latest"), "gpt-4o-mini");
    }

    #[test]
    fn test_unmapped_model_falls_back_to_target_default() {
        let r = ModelResolver::default();
        assert_eq!(r.resolve("anthropic", "gpt-3.5-turbo"), "claude-3-5-sonnet-latest");
        assert_eq!(r.resolve("openai", "claude-2.1"), "gpt-4o");
    }

    #[test]
    fn test_unknown_target_passes_model_through() {
        let r = ModelResolver::default();
        assert_eq!(r.resolve("mistral", "gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_replace_table_swaps_mapping_and_version() {
        let r = ModelResolver::default();
        let clone = r.clone();
        let mut cfg = RoutingConfig::default();
        cfg.version = "v2".into();
        cfg.providers.push(ProviderConfig {
            name: "mistral".into(),
            default_model: "mistral-large".into(),
            model_prefixes: vec!["mistral-".into()],
        });
        cfg.crossover.insert(
            0,
            CrossoverEntry {
                from: "gpt-4o".into(),
                provider: "anthropic".into(),
                to: "claude-3-opus".into(),
            },
        );
        r.replace_table(&cfg);

        assert_eq!(clone.table_version(), "v2");
        assert_eq!(clone.resolve("anthropic", "gpt-4o"), "claude-3-opus");
        assert_eq!(clone.resolve("mistral", "gpt-4o"), "mistral-large");
        assert_eq!(clone.native_provider("mistral-small"), "mistral");
    }

    #[test]
    fn test_default_table_version() {
        assert_eq!(
            ModelResolver::default().table_version(),
            RoutingConfig::default().version
        );
    }
}
