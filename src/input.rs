//! Input acquisition: pasted quiz text or one selected file.
//!
//! [`InputSource`] accepts both inputs independently and only checks mutual
//! exclusivity when a conversion is requested. [`InputSource::validate`] turns
//! a valid source into an [`InputSnapshot`], the frozen copy the preview
//! request and the later export request both send.
//!
//! File contents are never inspected. The extension list below is a display
//! hint for front ends, not a gate.

use crate::error::QuizError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Extensions the conversion service is known to accept.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "csv", "xlsx"];

/// A file chosen by the user, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    /// Wrap bytes that are already in memory (drag and drop, tests).
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Read a file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, QuizError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => QuizError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => QuizError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => QuizError::FileRead {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        debug!("Loaded quiz file {} ({} bytes)", path.display(), bytes.len());

        Ok(Self::from_bytes(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Size in kilobytes, as shown next to the file name.
    pub fn size_kb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }

    pub fn has_supported_extension(&self) -> bool {
        PathBuf::from(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(e))
            })
            .unwrap_or(false)
    }
}

/// Which input is currently populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Empty,
    Text,
    File,
    /// Both populated. Rejected by [`InputSource::validate`].
    Conflicting,
}

/// Holds pasted text and an optional selected file.
///
/// Setting one does not clear the other. Conflicts surface at convert time.
#[derive(Debug, Clone, Default)]
pub struct InputSource {
    text: String,
    file: Option<SelectedFile>,
}

impl InputSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Select a file, or clear the selection with `None`.
    pub fn set_file(&mut self, file: Option<SelectedFile>) {
        self.file = file;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.file = None;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    /// Text counts as present only when it has non-whitespace content.
    fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn mode(&self) -> InputMode {
        match (self.has_text(), self.file.is_some()) {
            (false, false) => InputMode::Empty,
            (true, false) => InputMode::Text,
            (false, true) => InputMode::File,
            (true, true) => InputMode::Conflicting,
        }
    }

    /// True when at least one input is populated.
    pub fn has_content(&self) -> bool {
        self.mode() != InputMode::Empty
    }

    /// Freeze the current input for a conversion episode.
    ///
    /// Fails with [`QuizError::Validation`] when both inputs are populated and
    /// with [`QuizError::EmptyInput`] when neither is.
    pub fn validate(&self) -> Result<InputSnapshot, QuizError> {
        match self.mode() {
            InputMode::Empty => Err(QuizError::EmptyInput),
            InputMode::Conflicting => Err(QuizError::Validation),
            InputMode::Text => Ok(InputSnapshot::Text(self.text.clone())),
            InputMode::File => self
                .file
                .clone()
                .map(InputSnapshot::File)
                .ok_or_else(|| QuizError::Internal("file mode without a file".into())),
        }
    }
}

/// The input captured when a conversion was requested.
///
/// Exactly one payload. Reused unchanged for the export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSnapshot {
    /// Sent as JSON `{ "quiz_text": ... }`.
    Text(String),
    /// Sent as a multipart form with field `file`.
    File(SelectedFile),
}

impl InputSnapshot {
    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            InputSnapshot::Text(t) => format!("pasted text ({} chars)", t.chars().count()),
            InputSnapshot::File(f) => format!("file '{}' ({} bytes)", f.name(), f.len()),
        }
    }
}
