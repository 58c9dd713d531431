//! Result types returned by the `convert*` entry points.

use crate::error::GenerationFailure;
use crate::pipeline::generate::GeneratedDiagram;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a single-shot conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramOutput {
    /// Stem the output name was derived from.
    pub output_stem: PathBuf,
    /// The written diagram, when generation succeeded.
    pub diagram: Option<GeneratedDiagram>,
    /// Why no diagram was written, when generation failed.
    pub error: Option<GenerationFailure>,
    pub duration_ms: u64,
}

impl DiagramOutput {
    /// Path of the written diagram, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        self.diagram.as_ref().map(|d| &d.path)
    }
}

/// One workflow's outcome in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// 1-indexed position in the document.
    pub index: usize,
    pub title: String,
    /// Written diagram path; `None` when the workflow failed.
    pub path: Option<PathBuf>,
    /// Attempts used, including rate-limited ones.
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<GenerationFailure>,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.path.is_some()
    }
}

/// Aggregate counts for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

/// Everything a batch run produced, in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub output_dir: PathBuf,
    pub results: Vec<WorkflowResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Paths of every diagram written.
    pub fn generated(&self) -> Vec<&PathBuf> {
        self.results.iter().filter_map(|r| r.path.as_ref()).collect()
    }

    /// Titles of every workflow that produced no diagram.
    pub fn failed_titles(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.title.as_str())
            .collect()
    }

    /// True when the document contained no workflows at all.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
