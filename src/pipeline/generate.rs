//! Diagram generation: one prompt in, one image file out.
//!
//! This is the only stage with network I/O. Each attempt builds a fresh
//! [`GenerationRequest`], folds the streamed response down to its last
//! non-empty image payload, and writes that payload with an extension taken
//! from its magic bytes.
//!
//! ## Retry Strategy
//!
//! Only rate limits are retried. The wait is the server's hint plus
//! [`DiagramConfig::backoff_margin`], or [`DiagramConfig::default_backoff`]
//! when the server gave none. Anything else (bad request, auth failure,
//! empty stream) ends the diagram on the spot; retrying would fail the same
//! way and burn quota.

use crate::backend::{GenerationRequest, ImageBackend, ResponseChunk};
use crate::config::DiagramConfig;
use crate::error::{BackendError, GenerationFailure};
use crate::pipeline::sniff::{sniff_format, ImageFormat};
use crate::prompts::build_diagram_prompt;
use futures::{future, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// A diagram that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDiagram {
    /// Final path, extension included.
    pub path: PathBuf,
    pub format: ImageFormat,
    pub size_bytes: usize,
    /// Attempts used, including rate-limited ones.
    pub attempts: u32,
}

/// Generate a flowchart for `text` and write it next to `output_stem`.
///
/// Any extension already on `output_stem` is replaced by the sniffed one, so
/// asking for `out.xyz` and receiving a JPEG writes `out.jpg` and never
/// creates `out.xyz`.
///
/// Never returns a fatal error: every way this can fail is a
/// [`GenerationFailure`] for the caller to record.
pub async fn generate_diagram(
    backend: &Arc<dyn ImageBackend>,
    text: &str,
    output_stem: &Path,
    config: &DiagramConfig,
) -> Result<GeneratedDiagram, GenerationFailure> {
    let request = GenerationRequest::new(build_diagram_prompt(text), config.model.as_str());
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        info!(
            "Generating diagram with {} (attempt {}/{})",
            request.model, attempt, max_attempts
        );

        match fetch_image(backend, &request).await {
            Ok(Some(image)) => return write_diagram(&image, output_stem, attempt).await,
            Ok(None) => {
                warn!("No image generated for {}", output_stem.display());
                return Err(GenerationFailure::NoImage { attempts: attempt });
            }
            Err(BackendError::RateLimited {
                retry_after,
                detail,
            }) => {
                if attempt >= max_attempts {
                    warn!(
                        "Rate limit persisted after {} attempts; giving up on {}",
                        attempt,
                        output_stem.display()
                    );
                    return Err(GenerationFailure::RateLimitExhausted {
                        attempts: attempt,
                        detail,
                    });
                }

                let wait = config.backoff_for(retry_after);
                warn!(
                    "Rate limited (attempt {}/{}), waiting {}s before retry",
                    attempt,
                    max_attempts,
                    wait.as_secs_f64()
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_rate_limited(attempt, max_attempts, wait);
                }
                sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("Diagram generation failed: {}", e);
                return Err(GenerationFailure::Backend {
                    attempts: attempt,
                    detail: e.to_string(),
                });
            }
        }
    }
}

/// Run one request and reduce its stream to the final image, if any.
async fn fetch_image(
    backend: &Arc<dyn ImageBackend>,
    request: &GenerationRequest,
) -> Result<Option<Vec<u8>>, BackendError> {
    let chunks = backend.stream_generate(request).await?;
    chunks
        .try_fold(None, |latest, chunk| {
            future::ready(Ok(keep_latest_payload(latest, chunk)))
        })
        .await
}

/// Fold step over a response stream: the last non-empty payload wins.
///
/// The backend refines its image as it streams, so earlier payloads are
/// superseded; a chunk with no usable payload leaves `latest` untouched.
pub fn keep_latest_payload(latest: Option<Vec<u8>>, chunk: ResponseChunk) -> Option<Vec<u8>> {
    chunk
        .payloads
        .into_iter()
        .rev()
        .find(|payload| !payload.is_empty())
        .or(latest)
}

/// Write `image` to `output_stem` with its sniffed extension.
///
/// Writes to a sibling temp file and renames it into place so a crash never
/// leaves a truncated image under the final name.
async fn write_diagram(
    image: &[u8],
    output_stem: &Path,
    attempts: u32,
) -> Result<GeneratedDiagram, GenerationFailure> {
    let format = sniff_format(image);
    let path = output_stem.with_extension(format.extension());
    let tmp_path = output_stem.with_extension(format!("{}.tmp", format.extension()));
    debug!("Sniffed {} ({} bytes)", format, image.len());

    let write_failed = |e: std::io::Error| GenerationFailure::WriteFailed {
        path: path.clone(),
        attempts,
        detail: e.to_string(),
    };

    tokio::fs::write(&tmp_path, image).await.map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    info!("Diagram saved to: {}", path.display());
    Ok(GeneratedDiagram {
        path,
        format,
        size_bytes: image.len(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(payloads: &[&[u8]]) -> ResponseChunk {
        ResponseChunk {
            payloads: payloads.iter().map(|p| p.to_vec()).collect(),
        }
    }

    #[test]
    fn last_non_empty_payload_wins() {
        let chunks = vec![
            chunk(&[b"draft"]),
            chunk(&[]),
            chunk(&[b"better", b""]),
            chunk(&[b""]),
        ];
        let result = chunks.into_iter().fold(None, keep_latest_payload);
        assert_eq!(result.as_deref(), Some(b"better".as_slice()));
    }

    #[test]
    fn no_payloads_means_no_image() {
        let chunks = vec![chunk(&[]), chunk(&[b""]), ResponseChunk::default()];
        assert_eq!(chunks.into_iter().fold(None, keep_latest_payload), None);
    }

    #[test]
    fn later_payload_within_chunk_wins() {
        let result = keep_latest_payload(Some(b"old".to_vec()), chunk(&[b"first", b"second"]));
        assert_eq!(result.as_deref(), Some(b"second".as_slice()));
    }

    #[tokio::test]
    async fn write_replaces_requested_extension() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("out.xyz");
        let gif = b"GIF89a\x01\x00\x01\x00";

        let diagram = write_diagram(gif, &stem, 1).await.unwrap();
        assert_eq!(diagram.path, dir.path().join("out.gif"));
        assert_eq!(diagram.format, ImageFormat::Gif);
        assert_eq!(diagram.size_bytes, gif.len());
        assert!(!stem.exists());
        assert!(!dir.path().join("out.gif.tmp").exists());
        assert_eq!(std::fs::read(&diagram.path).unwrap(), gif);
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("missing").join("out");

        let err = write_diagram(b"\x89PNG\r\n\x1a\n", &stem, 2).await.unwrap_err();
        match err {
            GenerationFailure::WriteFailed { path, attempts, .. } => {
                assert_eq!(path, dir.path().join("missing").join("out.png"));
                assert_eq!(attempts, 2);
            }
            other => panic!("expected WriteFailed, got {other:?}"),
        }
    }
}
