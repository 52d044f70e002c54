//! Download primitive - click an export control and keep the file it produces

use action_locator::{Action, LocatorChain};
use cdp_adapter::PageDriver;
use fxportal_core_types::Progress;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::errors::ActionError;
use crate::types::{DownloadArtifact, DEFAULT_DOWNLOAD_NAME};

/// Bounds for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTimeouts {
    /// Visibility wait per trigger candidate
    pub control: Duration,
    /// Wait for the download to finish once triggered
    pub wait: Duration,
}

impl Default for DownloadTimeouts {
    fn default() -> Self {
        Self {
            control: Duration::from_secs(5),
            wait: Duration::from_secs(20),
        }
    }
}

/// Execute download capture
///
/// Steps:
/// 1. Arm the download expectation on `dir`
/// 2. Click the first visible trigger candidate, or fail with `ControlNotFound`
/// 3. Await the download, or fail with `DownloadTimeout`
/// 4. Move the file to `dir/<suggested name>`, replacing any previous file
pub async fn capture_download(
    page: &dyn PageDriver,
    trigger: &LocatorChain,
    dir: &Path,
    timeouts: DownloadTimeouts,
    progress: &Progress,
) -> Result<DownloadArtifact, ActionError> {
    info!(trigger = %trigger.name(), dir = %dir.display(), "Capturing download");

    fs::create_dir_all(dir).await?;
    page.arm_download(dir).await?;

    if !trigger
        .locate_and_act(page, Action::Click, timeouts.control)
        .await
    {
        return Err(ActionError::ControlNotFound(format!(
            "download control '{}' not found",
            trigger.name()
        )));
    }

    let completed = page.await_download(timeouts.wait).await.map_err(|err| {
        ActionError::DownloadTimeout(err.hint.clone().unwrap_or_else(|| err.to_string()))
    })?;
    debug!(
        suggested = %completed.suggested_filename,
        path = %completed.path.display(),
        "Download completed"
    );

    let suggested_name = file_name_for(&completed.suggested_filename);
    let saved_path = dir.join(&suggested_name);
    persist(&completed.path, &saved_path).await?;

    progress
        .log(format!("💾 Saved: {}", saved_path.display()))
        .await;
    info!(path = %saved_path.display(), "Download saved");

    Ok(DownloadArtifact {
        suggested_name,
        saved_path,
    })
}

/// Last path component of the suggestion, or the fixed default.
pub fn file_name_for(suggested: &str) -> String {
    let name = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match name {
        "" | "." | ".." => DEFAULT_DOWNLOAD_NAME.to_string(),
        name => name.to_string(),
    }
}

async fn persist(from: &Path, to: &Path) -> Result<(), ActionError> {
    if from == to {
        return Ok(());
    }
    if fs::try_exists(to).await? {
        fs::remove_file(to).await?;
    }
    if let Err(err) = fs::rename(from, to).await {
        debug!(error = %err, "Rename failed, copying instead");
        fs::copy(from, to).await?;
        fs::remove_file(from).await?;
    }
    Ok(())
}
