//! Input resolution: read the how-to document from disk or fall back to the
//! bundled sample.
//!
//! Output names are derived from the input's file stem, so the resolved
//! input carries the stem alongside the text.

use crate::error::DiagramError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sample document used when no input path is given.
pub const SAMPLE_INPUT: &str = include_str!("../../samples/sample_input.txt");

/// Stem used for output names derived from [`SAMPLE_INPUT`].
pub const SAMPLE_STEM: &str = "sample_input";

/// A document ready for diagram generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDocument {
    /// Where the text came from; `None` for the bundled sample.
    pub path: Option<PathBuf>,
    /// File name without its extension.
    pub stem: String,
    pub text: String,
}

impl InputDocument {
    /// The bundled sample document.
    pub fn sample() -> Self {
        Self {
            path: None,
            stem: SAMPLE_STEM.to_string(),
            text: SAMPLE_INPUT.to_string(),
        }
    }
}

/// Read a UTF-8 text file.
///
/// Missing files, permission problems, other read failures and non-UTF-8
/// content each map to their own fatal [`DiagramError`].
pub async fn read_input(path: impl AsRef<Path>) -> Result<InputDocument, DiagramError> {
    let path = path.as_ref().to_path_buf();

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => DiagramError::FileNotFound { path: path.clone() },
        ErrorKind::PermissionDenied => DiagramError::PermissionDenied { path: path.clone() },
        _ => DiagramError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;

    let text = String::from_utf8(bytes)
        .map_err(|_| DiagramError::InvalidUtf8 { path: path.clone() })?;

    let stem = input_stem(&path);
    debug!("Read {} bytes from {}", text.len(), path.display());

    Ok(InputDocument {
        path: Some(path),
        stem,
        text,
    })
}

/// File name of `path` without its last extension.
pub fn input_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| SAMPLE_STEM.to_string())
}

/// `<stem>_diagram`: single-shot output stem; the extension is added once
/// the image format is known.
pub fn single_output_stem(stem: &str) -> PathBuf {
    PathBuf::from(format!("{stem}_diagram"))
}

/// `<stem>_diagrams`: default batch output directory.
pub fn default_batch_dir(stem: &str) -> PathBuf {
    PathBuf::from(format!("{stem}_diagrams"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems() {
        assert_eq!(input_stem(Path::new("docs/onboarding.md")), "onboarding");
        assert_eq!(input_stem(Path::new("notes")), "notes");
        assert_eq!(single_output_stem("onboarding"), PathBuf::from("onboarding_diagram"));
        assert_eq!(default_batch_dir("onboarding"), PathBuf::from("onboarding_diagrams"));
    }

    #[test]
    fn sample_has_workflows() {
        let doc = InputDocument::sample();
        assert_eq!(doc.stem, "sample_input");
        assert!(doc.path.is_none());
        assert!(!crate::pipeline::extract::extract_workflows(&doc.text).is_empty());
    }

    #[tokio::test]
    async fn reads_utf8_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.txt");
        std::fs::write(&path, "### How to Test\nRun it.").unwrap();

        let doc = read_input(&path).await.unwrap();
        assert_eq!(doc.stem, "guide");
        assert_eq!(doc.text, "### How to Test\nRun it.");
        assert_eq!(doc.path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let err = read_input("/definitely/not/a/real/file.txt").await.unwrap_err();
        assert!(matches!(err, DiagramError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn directory_is_not_reported_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(dir.path()).await.unwrap_err();
        assert!(matches!(err, DiagramError::ReadFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn binary_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = read_input(&path).await.unwrap_err();
        assert!(matches!(err, DiagramError::InvalidUtf8 { .. }));
    }
}
