//! Cached platform settings.
//!
//! Built once at startup and shared through application state. Reads are
//! served from memory until the TTL elapses; writes go straight to the store
//! and drop the cached copy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::info;

use crate::db::{CredentialStore, MAINTENANCE_MODE_KEY};
use crate::timeout::bounded;
use crate::Result;

/// Platform-wide switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformSettings {
    /// Non-admin traffic is refused while set.
    pub maintenance_mode: bool,
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("true") || v == "1")
}

/// TTL cache in front of the settings table.
pub struct SettingsCache {
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
    store_timeout: Duration,
    cached: RwLock<Option<(PlatformSettings, Instant)>>,
}

impl SettingsCache {
    /// Create an empty cache.
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration, store_timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            store_timeout,
            cached: RwLock::new(None),
        }
    }

    /// Current settings, loading them if the cached copy is stale.
    pub async fn get(&self) -> Result<PlatformSettings> {
        if let Some((settings, loaded_at)) = *self.cached.read().await {
            if loaded_at.elapsed() < self.ttl {
                return Ok(settings);
            }
        }

        let value = bounded(
            self.store_timeout,
            "credential store",
            self.store.get_setting(MAINTENANCE_MODE_KEY),
        )
        .await?;
        let settings = PlatformSettings {
            maintenance_mode: parse_flag(value.as_deref()),
        };

        *self.cached.write().await = Some((settings, Instant::now()));
        Ok(settings)
    }

    /// Drop the cached copy.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Persist the maintenance flag.
    pub async fn set_maintenance_mode(&self, enabled: bool) -> Result<()> {
        bounded(
            self.store_timeout,
            "credential store",
            self.store
                .set_setting(MAINTENANCE_MODE_KEY, if enabled { "true" } else { "false" }),
        )
        .await?;
        self.invalidate().await;
        info!(enabled, "Maintenance mode updated");
        Ok(())
    }
}
