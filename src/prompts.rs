//! Prompt template for flowchart generation.
//!
//! Every instruction sent to the image model lives here so the wording can
//! change without touching retry or I/O code, and so tests can inspect the
//! exact prompt without a network call.

/// Instructions placed before the documentation text.
pub const DIAGRAM_PROMPT_HEADER: &str = r#"Create a clear, professional flowchart diagram for this process documentation.

Requirements:
- Use boxes/rectangles for steps
- Use diamonds for decision points
- Use arrows to show flow direction
- Include brief labels on each node
- Use a clean, minimal style with good contrast
- Vertical flow (top to bottom)
- Number the steps if sequential

Documentation to visualize:"#;

/// Closing instruction placed after the documentation text.
pub const DIAGRAM_PROMPT_FOOTER: &str =
    "Generate a flowchart diagram that makes this process easy to understand at a glance.";

/// Build the image-generation prompt for a piece of how-to documentation.
///
/// The text is embedded verbatim between the header and footer, each
/// separated by a blank line. Empty or very large input is passed through
/// unchanged.
pub fn build_diagram_prompt(how_to_text: &str) -> String {
    format!("{DIAGRAM_PROMPT_HEADER}\n\n{how_to_text}\n\n{DIAGRAM_PROMPT_FOOTER}")
}
