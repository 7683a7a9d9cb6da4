//! Node discovery: where a collector's target list comes from.
//!
//! A collector asks its [`Discovery`] for targets at the start of every
//! run, so a file-backed list can change without a restart.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use swiftex_core::config::parse_target_list;
use swiftex_core::{DiscoveryConfig, Target};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::DiscoveryError;

/// Boxed future returned by [`Discovery::targets`].
pub type DiscoveryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Target>, DiscoveryError>> + Send + 'a>>;

/// Source of the storage nodes to probe.
pub trait Discovery: Send + Sync {
    fn targets(&self) -> DiscoveryFuture<'_>;
}

/// Build the discovery source described by the config.
pub fn from_config(config: &DiscoveryConfig) -> Arc<dyn Discovery> {
    match config {
        DiscoveryConfig::Static(targets) => Arc::new(StaticDiscovery::new(targets.clone())),
        DiscoveryConfig::File { path, default_port } => {
            Arc::new(FileDiscovery::new(path.clone(), *default_port))
        }
    }
}

// ── Static ─────────────────────────────────────────────────────────

/// A fixed target list.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    targets: Vec<Target>,
}

impl StaticDiscovery {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

impl Discovery for StaticDiscovery {
    fn targets(&self) -> DiscoveryFuture<'_> {
        Box::pin(async move { Ok(self.targets.clone()) })
    }
}

// ── File ───────────────────────────────────────────────────────────

/// A node list file, one `host[:port]` per line.
///
/// Blank lines and `#` comments are ignored. The file is re-read on every
/// call; if it cannot be read, the last list that parsed is returned.
#[derive(Debug)]
pub struct FileDiscovery {
    path: PathBuf,
    default_port: u16,
    last_good: Mutex<Option<Vec<Target>>>,
}

impl FileDiscovery {
    pub fn new(path: PathBuf, default_port: u16) -> Self {
        Self {
            path,
            default_port,
            last_good: Mutex::new(None),
        }
    }

    async fn load(&self) -> Result<Vec<Target>, DiscoveryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                let last_good = self.last_good.lock().await;
                return match last_good.as_ref() {
                    Some(targets) => {
                        warn!(
                            path = %self.path.display(),
                            error = %e,
                            "node list unreadable, using last good list"
                        );
                        Ok(targets.clone())
                    }
                    None => Err(DiscoveryError::Unavailable(format!(
                        "{}: {e}",
                        self.path.display()
                    ))),
                };
            }
        };

        let entries = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty());
        let targets = parse_target_list(entries, self.default_port)?;

        debug!(path = %self.path.display(), count = targets.len(), "node list loaded");
        *self.last_good.lock().await = Some(targets.clone());
        Ok(targets)
    }
}

impl Discovery for FileDiscovery {
    fn targets(&self) -> DiscoveryFuture<'_> {
        Box::pin(self.load())
    }
}
