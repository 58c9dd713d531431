//! # edgequake-text2diagram
//!
//! Turn "how-to" documentation into flowchart images using an
//! image-generation model (Gemini image models by default).
//!
//! ## Pipeline Overview
//!
//! ```text
//! text document
//!  │
//!  ├─ 1. Input     read the file (or the bundled sample)
//!  ├─ 2. Extract   batch mode: split into "How to …" workflows
//!  ├─ 3. Prompt    embed each text in the flowchart instruction template
//!  ├─ 4. Generate  stream the backend response, keep the last image,
//!  │               back off and retry on rate limits
//!  ├─ 5. Sniff     pick png / jpg / webp / gif from magic bytes
//!  └─ 6. Output    <stem>_diagram.<ext>  or  <dir>/<NN>_<slug>.<ext>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_text2diagram::{convert, convert_batch, DiagramConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GOOGLE_API_KEY / GEMINI_API_KEY
//!     let config = DiagramConfig::default();
//!
//!     let single = convert("How to make tea\n\n1. Boil water\n2. Steep", "tea", &config).await?;
//!     if let Some(path) = single.path() {
//!         println!("wrote {}", path.display());
//!     }
//!
//!     let doc = std::fs::read_to_string("handbook.md")?;
//!     let batch = convert_batch(&doc, "handbook_diagrams", &config).await?;
//!     println!("{}/{} diagrams", batch.stats.succeeded, batch.stats.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `text2diagram` binary (clap + anyhow + tracing-subscriber + indicatif + dotenv) |
//!
//! ## Choosing a Model
//!
//! | Model | Tier | Notes |
//! |-------|------|-------|
//! | `gemini-3-pro-image-preview` | paid | Default, best text rendering in nodes |
//! | `gemini-2.5-flash-image`     | free tier available | Faster, rougher labels |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{
    ChunkStream, GenerationRequest, ImageBackend, ResponseChunk, ResponseModality,
};
pub use config::{DiagramConfig, DiagramConfigBuilder, DEFAULT_MODEL};
pub use convert::{convert, convert_batch, convert_file, convert_file_batch};
pub use error::{BackendError, DiagramError, GenerationFailure};
pub use output::{BatchOutput, BatchStats, DiagramOutput, WorkflowResult};
pub use pipeline::extract::{extract_workflows, slugify, Workflow};
pub use pipeline::generate::{generate_diagram, GeneratedDiagram};
pub use pipeline::input::{read_input, InputDocument};
pub use pipeline::sniff::{image_extension, sniff_format, ImageFormat};
pub use progress::{DiagramProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::build_diagram_prompt;
