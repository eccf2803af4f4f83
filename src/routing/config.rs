//! Routing configuration types.
//!
//! Provides [`RoutingConfig`]: the provider set, the primary provider, and
//! the versioned crossover table used by [`super::ModelResolver`]. All
//! fields have defaults and are (de)serialisable via serde for TOML/JSON
//! config files.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ────────────────────────────────────────────

/// Default crossover table version tag.
fn default_version() -> String {
    "2024-10-01".to_string()
}

/// Default primary provider; unprefixed model names belong here.
fn default_primary_provider() -> String {
    "openai".to_string()
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "openai".to_string(),
            default_model: "gpt-4o".to_string(),
            model_prefixes: Vec::new(),
        },
        ProviderConfig {
            name: "anthropic".to_string(),
            default_model: "claude-3-5-sonnet-latest".to_string(),
            model_prefixes: vec!["claude-".to_string()],
        },
    ]
}

/// Default crossover pairs, tier-preserving in both directions.
fn default_crossover() -> Vec<CrossoverEntry> {
    let pairs = [
        ("gpt-4o", "anthropic", "claude-3-5-sonnet-latest"),
        ("gpt-4o-mini", "anthropic", "claude-3-5-haiku-latest"),
        ("claude-3-5-sonnet-latest", "openai", "gpt-4o"),
        ("claude-3-5-haiku-latest", "openai", "gpt-4o-mini"),
    ];
    pairs
        .iter()
        .map(|(from, provider, to)| CrossoverEntry {
            from: (*from).to_string(),
            provider: (*provider).to_string(),
            to: (*to).to_string(),
        })
        .collect()
}

// ── ProviderConfig ─────────────────────────────────────────────────────

/// One generation provider known to the router.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider identity, e.g. `"anthropic"`. Must be unique.
    pub name: String,

    /// Model used on this provider when no crossover entry matches.
    pub default_model: String,

    /// Model-name prefixes native to this provider (e.g. `"claude-"`).
    ///
    /// Leave empty for the primary provider: unmatched names default to it.
    #[serde(default)]
    pub model_prefixes: Vec<String>,
}

/// One explicit `(from, provider) → to` model substitution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CrossoverEntry {
    /// Requested model identifier (exact match).
    pub from: String,
    /// Target provider the request is failing over to.
    pub provider: String,
    /// Equivalent model on the target provider.
    pub to: String,
}

// ── RoutingConfig ──────────────────────────────────────────────────────

/// Configuration for provider routing and cross-provider model resolution.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Version tag of the crossover table, reported on reload.
    #[serde(default = "default_version")]
    pub version: String,

    /// Provider whose namespace owns every unprefixed model name.
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,

    /// Known providers, in declared (tie-break) order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Explicit model substitutions for failover.
    #[serde(default = "default_crossover")]
    pub crossover: Vec<CrossoverEntry>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            primary_provider: default_primary_provider(),
            providers: default_providers(),
            crossover: default_crossover(),
        }
    }
}

impl RoutingConfig {
    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Provider names in declared order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }
}

/// Validate a [`RoutingConfig`], returning a list of human-readable errors.
///
/// # Returns
///
/// An empty `Vec` on success, or one error string per violated constraint.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &RoutingConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.version.trim().is_empty() {
        errors.push("routing.version must not be empty".to_string());
    }

    if config.providers.is_empty() {
        errors.push("routing.providers must contain at least one provider".to_string());
    }

    let mut seen: Vec<&str> = Vec::new();
    for p in &config.providers {
        if p.name.trim().is_empty() {
            errors.push("routing.providers: name must not be empty".to_string());
        } else if seen.contains(&p.name.as_str()) {
            errors.push(format!("routing.providers: duplicate provider '{}'", p.name));
        } else {
            seen.push(p.name.as_str());
        }

        if p.default_model.trim().is_empty() {
            errors.push(format!(
                "routing.providers.{}: default_model must not be empty",
                p.name
            ));
        }

        if p.model_prefixes.iter().any(|prefix| prefix.is_empty()) {
            errors.push(format!(
                "routing.providers.{}: model_prefixes must not contain empty strings",
                p.name
            ));
        }
    }

    if config.provider(&config.primary_provider).is_none() {
        errors.push(format!(
            "routing.primary_provider '{}' is not a configured provider",
            config.primary_provider
        ));
    }

    for (i, entry) in config.crossover.iter().enumerate() {
        if config.provider(&entry.provider).is_none() {
            errors.push(format!(
                "routing.crossover[{i}]: unknown provider '{}'",
                entry.provider
            ));
        }
        if entry.from.is_empty() || entry.to.is_empty() {
            errors.push(format!(
                "routing.crossover[{i}]: from and to must not be empty"
            ));
        }
    }

    errors
}

// ── Tests ──────────────────────────────────────────────────────────────
