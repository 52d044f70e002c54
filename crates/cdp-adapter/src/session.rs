use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::driver::PageDriver;
use crate::error::AdapterError;

/// Releases whatever sits behind a page (browser process, handler task).
#[async_trait]
pub trait SessionTeardown: Send + Sync {
    async fn shutdown(&mut self) -> Result<(), AdapterError>;
}

/// Provisions an independent browser session per call.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<BrowserSession, AdapterError>;
}

/// One browser and its single page, owned by exactly one run.
pub struct BrowserSession {
    page: Arc<dyn PageDriver>,
    teardown: Mutex<Option<Box<dyn SessionTeardown>>>,
    closed: AtomicBool,
}

impl BrowserSession {
    pub fn new(page: Arc<dyn PageDriver>, teardown: Option<Box<dyn SessionTeardown>>) -> Self {
        Self {
            page,
            teardown: Mutex::new(teardown),
            closed: AtomicBool::new(false),
        }
    }

    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the page then the browser. Later calls are no-ops.
    pub async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let page_result = self.page.close().await;
        if let Err(err) = &page_result {
            debug!(target: "cdp-adapter", error = %err, "page close failed");
        }
        if let Some(mut teardown) = self.teardown.lock().await.take() {
            teardown.shutdown().await?;
        }
        page_result
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!(target: "cdp-adapter", "browser session dropped without close");
        }
    }
}
