//! Pipeline stages for text-to-diagram generation.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ generate ──▶ sniff ──▶ file
//! (text)    (batch only) (backend)   (magic)
//! ```
//!
//! 1. [`input`]    — read the document (or the bundled sample) and its stem
//! 2. [`extract`]  — cut "How to" sections into [`extract::Workflow`]s and
//!    derive file-safe slugs; batch mode only
//! 3. [`generate`] — prompt the backend, fold the streamed response, retry
//!    on rate limits; the only stage with network I/O
//! 4. [`sniff`]    — pick the file extension from the image's magic bytes

pub mod extract;
pub mod generate;
pub mod input;
pub mod sniff;
