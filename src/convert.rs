//! Conversion entry points: one diagram per document, or one per workflow.
//!
//! [`convert`] renders a whole document as a single flowchart.
//! [`convert_batch`] cuts it into "How to" workflows first and renders each
//! one separately, pausing between requests so a long document does not
//! trip the backend's rate limits.
//!
//! Both return `Err(DiagramError)` only for fatal problems (no API key,
//! output directory cannot be created). A diagram that fails is recorded in
//! the output and never aborts the run.

use crate::backend::{resolve_backend, ImageBackend};
use crate::config::DiagramConfig;
use crate::error::{DiagramError, GenerationFailure};
use crate::output::{BatchOutput, BatchStats, DiagramOutput, WorkflowResult};
use crate::pipeline::extract::{extract_workflows, slugify, Workflow};
use crate::pipeline::generate::generate_diagram;
use crate::pipeline::input::{default_batch_dir, read_input, single_output_stem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{info, warn};

/// Render `text` as one flowchart written next to `output_stem`.
///
/// # Errors
/// Returns `Err` only when no backend can be configured
/// ([`DiagramError::MissingApiKey`]). Generation failures are reported in
/// [`DiagramOutput::error`].
pub async fn convert(
    text: &str,
    output_stem: impl AsRef<Path>,
    config: &DiagramConfig,
) -> Result<DiagramOutput, DiagramError> {
    let backend = resolve_backend(config)?;
    Ok(convert_with_backend(&backend, text, output_stem.as_ref(), config).await)
}

/// Read `input_path` and write `<input-stem>_diagram.<ext>` in the current
/// directory.
pub async fn convert_file(
    input_path: impl AsRef<Path>,
    config: &DiagramConfig,
) -> Result<DiagramOutput, DiagramError> {
    let doc = read_input(input_path).await?;
    convert(&doc.text, single_output_stem(&doc.stem), config).await
}

/// Extract every workflow from `document` and render each into `output_dir`.
///
/// Files are named `<NN>_<slug>.<ext>` with a 1-based, zero-padded index, so
/// names stay unique even when two titles slug to the same string.
///
/// A document without workflows returns an empty [`BatchOutput`] and does
/// not touch `output_dir`.
pub async fn convert_batch(
    document: &str,
    output_dir: impl AsRef<Path>,
    config: &DiagramConfig,
) -> Result<BatchOutput, DiagramError> {
    let output_dir = output_dir.as_ref().to_path_buf();
    let workflows = extract_workflows(document);

    if workflows.is_empty() {
        warn!("No 'How to' workflows found in document");
        return Ok(BatchOutput {
            output_dir,
            ..BatchOutput::default()
        });
    }

    let backend = resolve_backend(config)?;

    tokio::fs::create_dir_all(&output_dir)
        .await
        .map_err(|e| DiagramError::OutputDirFailed {
            path: output_dir.clone(),
            source: e,
        })?;

    Ok(run_batch(&backend, workflows, output_dir, config).await)
}

/// Read `input_path` and run [`convert_batch`] into `output_dir`, or into
/// `<input-stem>_diagrams` when no directory is given.
pub async fn convert_file_batch(
    input_path: impl AsRef<Path>,
    output_dir: Option<PathBuf>,
    config: &DiagramConfig,
) -> Result<BatchOutput, DiagramError> {
    let doc = read_input(input_path).await?;
    let dir = output_dir.unwrap_or_else(|| default_batch_dir(&doc.stem));
    convert_batch(&doc.text, dir, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn convert_with_backend(
    backend: &Arc<dyn ImageBackend>,
    text: &str,
    output_stem: &Path,
    config: &DiagramConfig,
) -> DiagramOutput {
    let start = Instant::now();
    let result = generate_diagram(backend, text, output_stem, config).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(diagram) => DiagramOutput {
            output_stem: output_stem.to_path_buf(),
            diagram: Some(diagram),
            error: None,
            duration_ms,
        },
        Err(e) => DiagramOutput {
            output_stem: output_stem.to_path_buf(),
            diagram: None,
            error: Some(e),
            duration_ms,
        },
    }
}

/// Process workflows strictly in order, one request in flight at a time.
async fn run_batch(
    backend: &Arc<dyn ImageBackend>,
    workflows: Vec<Workflow>,
    output_dir: PathBuf,
    config: &DiagramConfig,
) -> BatchOutput {
    let total_start = Instant::now();
    let total = workflows.len();
    info!("Found {} workflows", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results = Vec::with_capacity(total);

    for (i, workflow) in workflows.iter().enumerate() {
        let index = i + 1;
        if i > 0 && !config.inter_request_delay.is_zero() {
            info!(
                "Waiting {}s before next request",
                config.inter_request_delay.as_secs_f64()
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_cooldown(config.inter_request_delay);
            }
            sleep(config.inter_request_delay).await;
        }

        info!("[{}/{}] {}", index, total, workflow.title);
        if let Some(ref cb) = config.progress_callback {
            cb.on_workflow_start(index, total, &workflow.title);
        }

        let stem = output_dir.join(workflow_stem(index, &workflow.title));
        let start = Instant::now();
        let outcome = generate_diagram(backend, &workflow.content, &stem, config).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(diagram) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_workflow_complete(index, total, &diagram.path);
                }
                WorkflowResult {
                    index,
                    title: workflow.title.clone(),
                    path: Some(diagram.path),
                    attempts: diagram.attempts,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_workflow_error(index, total, &workflow.title, &e.to_string());
                }
                WorkflowResult {
                    index,
                    title: workflow.title.clone(),
                    path: None,
                    attempts: failure_attempts(&e),
                    duration_ms,
                    error: Some(e),
                }
            }
        };
        results.push(result);
    }

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let stats = BatchStats {
        total,
        succeeded,
        failed: total - succeeded,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!("Generated {}/{} diagrams", succeeded, total);
    for failed in results.iter().filter(|r| !r.is_success()) {
        warn!("Failed: {}", failed.title);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    BatchOutput {
        output_dir,
        results,
        stats,
    }
}

/// `<NN>_<slug>`, 1-based and zero-padded to two digits.
fn workflow_stem(index: usize, title: &str) -> String {
    let slug = slugify(title);
    let slug = if slug.is_empty() { "workflow".to_string() } else { slug };
    format!("{index:02}_{slug}")
}

fn failure_attempts(failure: &GenerationFailure) -> u32 {
    match failure {
        GenerationFailure::NoImage { attempts }
        | GenerationFailure::RateLimitExhausted { attempts, .. }
        | GenerationFailure::Backend { attempts, .. }
        | GenerationFailure::WriteFailed { attempts, .. } => *attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_stems_are_numbered() {
        assert_eq!(workflow_stem(1, "How to Reset a Password"), "01_reset_a_password");
        assert_eq!(workflow_stem(12, "How to Deploy"), "12_deploy");
        assert_eq!(workflow_stem(100, "How to Deploy"), "100_deploy");
        assert_eq!(workflow_stem(3, "How to ???"), "03_workflow");
    }

    #[test]
    fn attempts_from_failure() {
        assert_eq!(failure_attempts(&GenerationFailure::NoImage { attempts: 2 }), 2);
        assert_eq!(
            failure_attempts(&GenerationFailure::Backend {
                attempts: 3,
                detail: "boom".into()
            }),
            3
        );
        assert_eq!(
            failure_attempts(&GenerationFailure::WriteFailed {
                path: PathBuf::from("01_x.png"),
                attempts: 2,
                detail: "disk full".into()
            }),
            2
        );
    }

    #[tokio::test]
    async fn batch_without_workflows_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("diagrams");
        // No backend and possibly no API key: extraction happens first, so
        // an empty document never needs one.
        let out = convert_batch("# Notes\n\nNothing to do here.", &out_dir, &DiagramConfig::default())
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.stats.total, 0);
        assert!(!out_dir.exists());
    }
}
