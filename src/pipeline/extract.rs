//! Workflow extraction: split a document into independent "How to …" blocks.
//!
//! Long how-to documents usually hold many procedures under headings such as
//! `### **How to Install**`. A single diagram of the whole document is
//! unreadable, so batch mode cuts the document at those headings and renders
//! one flowchart per procedure.
//!
//! A section runs from just after its heading to the next "How to" heading,
//! a horizontal rule, or the end of the document, whichever comes first.
//! Other headings inside a section stay part of its body.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single procedure cut out of a larger document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Heading text without emphasis markers, e.g. `"How to Install"`.
    pub title: String,
    /// Title, blank line, trimmed body. This is what gets sent to the model.
    pub content: String,
}

impl Workflow {
    /// Title without its leading "How to " for display.
    pub fn display_name(&self) -> &str {
        strip_how_to(&self.title)
    }
}

/// "How to" heading: 1–6 `#`, optional `*`/`_` emphasis around the text.
static RE_HOWTO_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*#{1,6}[ \t]*[*_]*[ \t]*(how[ \t]+to\b[^\n]*?)[ \t]*[*_]*[ \t]*$")
        .unwrap()
});

/// Horizontal rule on its own line: `---`, `***` or `___`.
static RE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$").unwrap());

static RE_HOWTO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^how[ \t]+to[ \t]+").unwrap());

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// `*` / `_` runs that open or close emphasis: after a word boundary on one
/// side, before one on the other. Intra-word underscores (`snake_case`) stay.
static RE_EMPHASIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[\s(\[])[*_]+|[*_]+($|[\s)\].,:;!?])").unwrap()
});

/// Extract every "How to" section with a non-empty body, in document order.
///
/// A document without matching headings yields an empty vector; that is
/// "nothing to do", not an error. Headings with no body text are skipped
/// individually.
pub fn extract_workflows(document: &str) -> Vec<Workflow> {
    let doc = document.replace("\r\n", "\n");

    let headings: Vec<(usize, usize, String)> = RE_HOWTO_HEADING
        .captures_iter(&doc)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = clean_title(caps.get(1)?.as_str());
            Some((whole.start(), whole.end(), title))
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .filter_map(|(i, (_, body_start, title))| {
            let body_end = headings
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(doc.len());
            let section = &doc[*body_start..body_end];
            let section = match RE_RULE.find(section) {
                Some(rule) => &section[..rule.start()],
                None => section,
            };

            let body = section.trim();
            if body.is_empty() {
                return None;
            }

            Some(Workflow {
                title: title.clone(),
                content: format!("{title}\n\n{body}"),
            })
        })
        .collect()
}

/// Derive a filesystem-safe name from a workflow title.
///
/// `"How to Reset a Password"` → `"reset_a_password"`. The result holds only
/// ASCII lowercase letters, digits and single internal underscores; it can be
/// empty for titles with no alphanumerics, so callers that need a unique,
/// non-empty name prefix a sequence number.
pub fn slugify(title: &str) -> String {
    let lowered = strip_how_to(title.trim()).to_lowercase();
    RE_NON_ALNUM
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

fn strip_how_to(title: &str) -> &str {
    match RE_HOWTO_PREFIX.find(title) {
        Some(m) => &title[m.end()..],
        None => title,
    }
}

fn clean_title(raw: &str) -> String {
    RE_EMPHASIS
        .replace_all(raw.trim(), "${1}${2}")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_emphasised_headings() {
        let doc = "### **How to Install**\nDownload the package.\nRun the installer.\n\n\
                   ### **How to Configure**\nEdit config.toml.\n";
        let wfs = extract_workflows(doc);
        assert_eq!(wfs.len(), 2);
        assert_eq!(wfs[0].title, "How to Install");
        assert_eq!(wfs[1].title, "How to Configure");
        assert_eq!(
            wfs[0].content,
            "How to Install\n\nDownload the package.\nRun the installer."
        );
        assert_eq!(wfs[1].content, "How to Configure\n\nEdit config.toml.");
    }

    #[test]
    fn no_headings_yields_nothing() {
        assert!(extract_workflows("# Intro\n\nJust prose, no procedures.").is_empty());
        assert!(extract_workflows("").is_empty());
    }

    #[test]
    fn heading_match_is_case_insensitive() {
        let doc = "## HOW TO restart\nPress the button.\n## how to Stop\nPull the plug.";
        let titles: Vec<_> = extract_workflows(doc).into_iter().map(|w| w.title).collect();
        assert_eq!(titles, vec!["HOW TO restart", "how to Stop"]);
    }

    #[test]
    fn plain_and_italic_headings() {
        let doc = "### How to Plain\nbody one\n### *How to Italic*\nbody two\n### __How to Under__\nbody three";
        let titles: Vec<_> = extract_workflows(doc).into_iter().map(|w| w.title).collect();
        assert_eq!(titles, vec!["How to Plain", "How to Italic", "How to Under"]);
    }

    #[test]
    fn emphasis_inside_heading_is_stripped() {
        let doc = "### **How to Install** (Linux)\nbody a\n\
                   ## How to use **bold** and _italic_ flags\nbody b\n\
                   # __How to run snake_case tools__\nbody c";
        let titles: Vec<_> = extract_workflows(doc).into_iter().map(|w| w.title).collect();
        assert_eq!(
            titles,
            vec![
                "How to Install (Linux)",
                "How to use bold and italic flags",
                "How to run snake_case tools",
            ]
        );
    }

    #[test]
    fn empty_sections_are_dropped_individually() {
        let doc = "### **How to A**\n\n### **How to B**\n   \n### **How to C**\nreal body\n";
        let wfs = extract_workflows(doc);
        assert_eq!(wfs.len(), 1);
        assert_eq!(wfs[0].title, "How to C");
    }

    #[test]
    fn horizontal_rule_ends_section() {
        let doc = "### How to Build\ncargo build\n---\nUnrelated appendix\n### How to Test\ncargo test";
        let wfs = extract_workflows(doc);
        assert_eq!(wfs.len(), 2);
        assert_eq!(wfs[0].content, "How to Build\n\ncargo build");
        assert_eq!(wfs[1].content, "How to Test\n\ncargo test");
    }

    #[test]
    fn non_howto_headings_stay_in_body() {
        let doc = "### How to Deploy\n#### Prerequisites\nA server.\n#### Steps\n1. Push";
        let wfs = extract_workflows(doc);
        assert_eq!(wfs.len(), 1);
        assert!(wfs[0].content.contains("#### Prerequisites"));
        assert!(wfs[0].content.ends_with("1. Push"));
    }

    #[test]
    fn crlf_input() {
        let doc = "### How to Log In\r\nOpen the page.\r\n\r\n### How to Log Out\r\nClick exit.\r\n";
        let wfs = extract_workflows(doc);
        assert_eq!(wfs.len(), 2);
        assert_eq!(wfs[0].content, "How to Log In\n\nOpen the page.");
    }

    #[test]
    fn bodies_are_trimmed_and_ordered() {
        let doc = (1..=5)
            .map(|i| format!("## How to Step {i}\n\n   body {i}   \n\n"))
            .collect::<String>();
        let wfs = extract_workflows(&doc);
        assert_eq!(wfs.len(), 5);
        for (i, wf) in wfs.iter().enumerate() {
            assert_eq!(wf.title, format!("How to Step {}", i + 1));
            let body = wf.content.split_once("\n\n").unwrap().1;
            assert_eq!(body, body.trim());
            assert_eq!(body, format!("body {}", i + 1));
        }
    }

    #[test]
    fn display_name_strips_prefix() {
        let wf = Workflow {
            title: "How to Reset a Password".into(),
            content: String::new(),
        };
        assert_eq!(wf.display_name(), "Reset a Password");
    }

    #[test]
    fn slug_examples() {
        assert_eq!(slugify("How to Reset a Password"), "reset_a_password");
        assert_eq!(slugify("HOW TO  Set-up   Wi-Fi!!"), "set_up_wi_fi");
        assert_eq!(slugify("  how to use *bold* text  "), "use_bold_text");
        assert_eq!(slugify("Deploy v2.0 (beta)"), "deploy_v2_0_beta");
        assert_eq!(slugify("How to ???"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn slug_character_set() {
        let titles = [
            "How to Reset a Password",
            "__How to__ weird   ---   title__",
            "Ünïcödé heading — with dashes",
            "___",
            "How to 123 go",
            "   trailing punctuation...   ",
        ];
        for title in titles {
            let slug = slugify(title);
            assert!(
                slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                "{title:?} → {slug:?}"
            );
            assert!(!slug.starts_with('_') && !slug.ends_with('_'), "{slug:?}");
            assert!(!slug.contains("__"), "{slug:?}");
        }
    }
}
