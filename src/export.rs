//! Export: turn a reviewed preview into a package on disk.
//!
//! The review step only looks. The package is built from the same
//! [`InputSnapshot`] the preview was built from, not from the questions the
//! user saw, so what is exported is exactly what was previewed.

use crate::client::RemoteConversionClient;
use crate::config::{ExportType, WorkflowConfig};
use crate::error::QuizError;
use crate::input::InputSnapshot;
use crate::preview::PreviewStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A package written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPackage {
    pub path: PathBuf,
    pub size_bytes: usize,
}

/// Requests the final package and saves it.
pub struct ExportController {
    client: Arc<dyn RemoteConversionClient>,
    output_dir: PathBuf,
    file_name: String,
    timeout: Duration,
}

impl ExportController {
    pub fn new(client: Arc<dyn RemoteConversionClient>, config: &WorkflowConfig) -> Self {
        Self {
            client,
            output_dir: config.output_dir.clone(),
            file_name: config.package_file_name.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// Where the package will be written.
    pub fn package_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    /// Close the dialog, then download and save the package.
    ///
    /// Returns `Ok(None)` for export types without a download path
    /// ([`ExportType::Canvas`]).
    pub async fn finalize(
        &self,
        store: &mut PreviewStore,
        snapshot: &InputSnapshot,
        export_type: ExportType,
    ) -> Result<Option<SavedPackage>, QuizError> {
        store.hide();
        info!("Exporting {} questions as {}", store.len(), export_type);

        if !export_type.is_enabled() {
            debug!("{} export has no download path, nothing to do", export_type);
            return Ok(None);
        }

        let bytes = tokio::time::timeout(self.timeout, self.client.download(snapshot, export_type))
            .await
            .map_err(|_| QuizError::Timeout {
                endpoint: crate::client::DOWNLOAD_ENDPOINT.to_string(),
                secs: self.timeout.as_secs(),
            })??;

        let size_bytes = bytes.len();
        let path = save_package(&self.output_dir, &self.file_name, bytes).await?;
        info!("Saved {} ({} bytes)", path.display(), size_bytes);

        Ok(Some(SavedPackage { path, size_bytes }))
    }
}

/// Write `bytes` to `dir/file_name` atomically.
///
/// The data goes to a temp file in the same directory first and is renamed
/// into place, so a failed write never leaves a truncated archive behind.
pub async fn save_package(
    dir: &Path,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<PathBuf, QuizError> {
    let dir = dir.to_path_buf();
    let path = dir.join(file_name);

    tokio::task::spawn_blocking(move || -> Result<PathBuf, QuizError> {
        let write_err = |source: std::io::Error| QuizError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(path)
    })
    .await
    .map_err(|e| QuizError::Internal(format!("save task failed: {e}")))?
}
