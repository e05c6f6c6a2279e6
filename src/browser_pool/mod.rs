//! Shared browser context with a hard concurrency cap.
//!
//! A single Chrome instance is launched once and shared across all fetches.
//! Per-request isolation comes from opening a fresh page (tab) per fetch, not
//! from separate browser processes. Concurrency is bounded by a semaphore
//! sized to `max_concurrent_pages`, not by a pool of browser instances.

use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Configuration for the browser pool.
#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Run the browser in headless mode.
    pub headless: bool,
    /// Hard cap on concurrently open pages (tabs).
    pub max_concurrent_pages: usize,
    /// When true, a failed browser launch at startup does not fail the
    /// binary. The pool just reports `is_connected() == false` so the rest
    /// of the service (and its test suite) can run without a real Chrome.
    pub testing_mode: bool,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            headless: true,
            max_concurrent_pages: 10,
            testing_mode: false,
        }
    }
}

struct BrowserHandle {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        self.handler.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            warn!(
                "Failed to clean up browser profile directory {}: {}",
                self.user_data_dir.display(),
                e
            );
        }
    }
}

/// Shared browser context plus the semaphore that bounds concurrent pages.
pub struct BrowserPool {
    config: BrowserPoolConfig,
    inner: Mutex<Option<BrowserHandle>>,
    semaphore: Arc<Semaphore>,
    connected: AtomicBool,
}

impl std::fmt::Debug for BrowserPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserPool")
            .field("config", &self.config)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl BrowserPool {
    /// Create a new pool. Does not launch a browser yet, call `start()`.
    pub fn new(config: BrowserPoolConfig) -> Arc<Self> {
        let max_concurrent_pages = config.max_concurrent_pages.max(1);
        Arc::new(Self {
            config,
            inner: Mutex::new(None),
            semaphore: Arc::new(Semaphore::new(max_concurrent_pages)),
            connected: AtomicBool::new(false),
        })
    }

    /// Launch the shared browser. In testing mode, a launch failure is
    /// logged and swallowed rather than propagated.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        match crate::browser_profile::cleanup_stale_profiles() {
            Ok(0) => {}
            Ok(n) => info!("Cleaned {} stale browser profile directories from a previous run", n),
            Err(e) => warn!("Stale profile cleanup failed, continuing anyway: {}", e),
        }

        match self.launch().await {
            Ok(handle) => {
                *self.inner.lock().await = Some(handle);
                self.connected.store(true, Ordering::Relaxed);
                info!("Browser pool started");
                Ok(())
            }
            Err(e) => {
                if self.config.testing_mode {
                    warn!(
                        "Browser launch failed in testing mode, continuing without a browser: {}",
                        e
                    );
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn launch(&self) -> Result<BrowserHandle> {
        let profile = crate::browser_profile::create_unique_profile_with_prefix("iris_chrome")
            .context("Failed to create browser profile directory")?;
        let user_data_dir = profile.into_path();

        let (browser, handler, returned_dir) =
            crate::browser_setup::launch_browser(self.config.headless, Some(user_data_dir))
                .await
                .context("Failed to launch shared browser")?;

        Ok(BrowserHandle {
            browser: Arc::new(browser),
            handler,
            user_data_dir: returned_dir,
        })
    }

    /// Whether the shared browser is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Number of page slots currently checked out.
    pub fn active_pages(&self) -> usize {
        let total = self.semaphore.available_permits();
        self.config.max_concurrent_pages.saturating_sub(total)
    }

    /// Acquire a page slot. Blocks (async) until a slot is free, then hands
    /// back a guard holding the permit and a clone of the shared browser
    /// handle. Fails immediately if the browser is not connected.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledBrowserGuard> {
        if !self.is_connected() {
            anyhow::bail!("browser pool is not connected");
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("browser pool semaphore closed")?;

        let guard = self.inner.lock().await;
        let browser = guard
            .as_ref()
            .map(|h| Arc::clone(&h.browser))
            .ok_or_else(|| anyhow::anyhow!("browser pool is not connected"))?;

        Ok(PooledBrowserGuard {
            browser,
            _permit: permit,
        })
    }

    /// Gracefully close the shared browser and release resources.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down browser pool");
        self.connected.store(false, Ordering::Relaxed);

        if let Some(mut handle) = self.inner.lock().await.take() {
            if let Some(browser) = Arc::get_mut(&mut handle.browser) {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser cleanly: {}", e);
                }
                let _ = browser.wait().await;
            } else {
                warn!("Browser has outstanding page references, skipping graceful close");
            }
        }

        Ok(())
    }
}

/// RAII guard for a checked-out page slot. Releases the semaphore permit on
/// drop; carries no per-browser cleanup since the browser is shared, not
/// owned by the guard.
pub struct PooledBrowserGuard {
    browser: Arc<Browser>,
    _permit: OwnedSemaphorePermit,
}

impl PooledBrowserGuard {
    /// The shared browser instance.
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Clone of the `Arc<Browser>`, for passing into a spawned task.
    pub fn browser_arc(&self) -> Arc<Browser> {
        Arc::clone(&self.browser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let config = BrowserPoolConfig::default();
        assert!(config.max_concurrent_pages > 0);
        assert!(config.headless);
    }

    #[tokio::test]
    async fn acquire_fails_when_not_connected() {
        let pool = BrowserPool::new(BrowserPoolConfig {
            max_concurrent_pages: 2,
            ..Default::default()
        });
        assert!(!pool.is_connected());
        assert!(pool.acquire().await.is_err());
    }
}
