//! Configuration hot-reload watcher.
//!
//! ## Responsibility
//! Watch the governance TOML file for changes and broadcast validated new
//! configs to subscribers. Invalid reloads are logged and rejected; the
//! current config remains unchanged.
//!
//! ## Guarantees
//! - Only validated configs are broadcast
//! - Invalid file edits are logged but do not disrupt the running system
//! - File watching is debounced to avoid rapid re-reads on multi-write editors
//! - Subscribers receive the new config via a `broadcast` channel
//!
//! ## NOT Responsible For
//! - Applying the config (see [`ConfigWatcher::apply_routing_updates`] for
//!   the crossover-table hook)
//! - Initial config loading (that belongs to `loader`)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use super::loader::load_from_file;
use super::validation::ConfigError;
use super::GovernanceConfig;
use crate::routing::ModelResolver;

/// Watches a config file for changes and broadcasts validated updates.
///
/// # Panics
///
/// This type never panics.
pub struct ConfigWatcher {
    tx: broadcast::Sender<GovernanceConfig>,
    /// Dropping this stops file watching.
    _watcher: Arc<Mutex<RecommendedWatcher>>,
}

impl ConfigWatcher {
    /// Start watching `path`.
    ///
    /// Returns the watcher and a receiver for config change notifications.
    /// The initial config is **not** broadcast; use `loader::load_from_file`
    /// for the initial load.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file watcher cannot be created or
    /// the parent directory cannot be watched.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use tokio_ai_governance::config::watcher::ConfigWatcher;
    /// use std::path::PathBuf;
    ///
    /// let (watcher, mut rx) = ConfigWatcher::new(PathBuf::from("governance.toml"))?;
    /// tokio::spawn(async move {
    ///     while let Ok(config) = rx.recv().await {
    ///         println!("crossover table now {}", config.routing.version);
    ///     }
    /// });
    /// ```
    pub fn new(
        path: PathBuf,
    ) -> Result<(Self, broadcast::Receiver<GovernanceConfig>), ConfigError> {
        let (tx, rx) = broadcast::channel(8);
        let tx_clone = tx.clone();

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| ConfigError::Io {
            file: path.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;

        // Watch the parent directory so atomic-save editors (write temp,
        // rename over original) are still seen.
        let watch_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::Io {
                file: watch_dir.display().to_string(),
                source: std::io::Error::other(e.to_string()),
            })?;

        let watcher = Arc::new(Mutex::new(watcher));

        let config_path = path;
        tokio::spawn(async move {
            let debounce = Duration::from_millis(500);
            let mut last_reload = std::time::Instant::now()
                .checked_sub(debounce)
                .unwrap_or_else(std::time::Instant::now);

            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;

                let mut should_reload = false;
                loop {
                    match notify_rx.try_recv() {
                        Ok(event) => {
                            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                                && event
                                    .paths
                                    .iter()
                                    .any(|p| p.file_name() == config_path.file_name())
                            {
                                should_reload = true;
                            }
                        }
                        Err(std::sync::mpsc::TryRecvError::Empty) => break,
                        // The notify watcher was dropped with ConfigWatcher.
                        Err(std::sync::mpsc::TryRecvError::Disconnected) => return,
                    }
                }

                if should_reload && last_reload.elapsed() >= debounce {
                    last_reload = std::time::Instant::now();
                    match load_from_file(&config_path) {
                        Ok(new_config) => {
                            tracing::info!(
                                path = %config_path.display(),
                                service = %new_config.service.name,
                                routing_version = %new_config.routing.version,
                                "config reloaded successfully"
                            );
                            let _ = tx_clone.send(new_config);
                        }
                        Err(e) => {
                            tracing::warn!(
                                path = %config_path.display(),
                                error = %e,
                                "config reload rejected; keeping current config"
                            );
                        }
                    }
                }
            }
        });

        Ok((
            Self {
                tx,
                _watcher: watcher,
            },
            rx,
        ))
    }

    /// Subscribe to config change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceConfig> {
        self.tx.subscribe()
    }

    /// Spawn a task that swaps `resolver`'s crossover table whenever a new
    /// config is broadcast.
    ///
    /// The task ends when the watcher is dropped.
    pub fn apply_routing_updates(&self, resolver: ModelResolver) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(config) => resolver.replace_table(&config.routing),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "config updates lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID_TOML: &str = r#"
[service]
name = "watcher-test"

[routing]
version = "v1"
"#;

    #[tokio::test]
    async fn test_config_watcher_creation_succeeds() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, VALID_TOML).expect("test: write");

        assert!(ConfigWatcher::new(path).is_ok());
    }

    #[tokio::test]
    async fn test_config_watcher_subscribe_returns_receiver() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, VALID_TOML).expect("test: write");

        let (watcher, _rx) = ConfigWatcher::new(path).expect("test: create watcher");
        let _rx2 = watcher.subscribe();
    }

    #[tokio::test]
    async fn test_config_watcher_detects_file_change() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, VALID_TOML).expect("test: write");

        let (_watcher, mut rx) = ConfigWatcher::new(path.clone()).expect("test: create watcher");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let updated = VALID_TOML.replace("watcher-test", "updated-name");
        let mut f = std::fs::File::create(&path).expect("test: open for write");
        f.write_all(updated.as_bytes()).expect("test: write");
        f.sync_all().expect("test: sync");
        drop(f);

        let result = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        let config = result.expect("test: timeout").expect("test: recv");
        assert_eq!(config.service.name, "updated-name");
    }

    #[tokio::test]
    async fn test_config_watcher_swaps_resolver_table() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, VALID_TOML).expect("test: write");

        let resolver = ModelResolver::default();
        let (watcher, _rx) = ConfigWatcher::new(path.clone()).expect("test: create watcher");
        let _task = watcher.apply_routing_updates(resolver.clone());
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, VALID_TOML.replace("\"v1\"", "\"v2\"")).expect("test: write");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while resolver.table_version() != "v2" && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(resolver.table_version(), "v2");
    }

    #[tokio::test]
    async fn test_config_watcher_rejects_invalid_reload() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, VALID_TOML).expect("test: write");

        let (_watcher, mut rx) = ConfigWatcher::new(path.clone()).expect("test: create watcher");
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, "invalid [[[").expect("test: write invalid");

        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(result.is_err(), "should not broadcast invalid config");
    }

    #[tokio::test]
    async fn test_config_watcher_rejects_semantically_invalid_reload() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, VALID_TOML).expect("test: write");

        let (_watcher, mut rx) = ConfigWatcher::new(path.clone()).expect("test: create watcher");
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, "[routing]\nprimary_provider = \"nobody\"\n")
            .expect("test: write invalid");

        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(result.is_err(), "should not broadcast invalid config");
    }

    #[tokio::test]
    async fn test_config_watcher_nonexistent_parent_returns_error() {
        let path = PathBuf::from("/definitely/nonexistent/dir/governance.toml");
        assert!(ConfigWatcher::new(path).is_err());
    }
}
