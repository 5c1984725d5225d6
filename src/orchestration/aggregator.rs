//! Result aggregation into the final document.
//!
//! Aggregation is a pure function of the results map and the document
//! shape: identical inputs yield byte-identical output regardless of
//! the order results were produced. Non-success slots render a visible
//! placeholder with the recorded reason; nothing is silently dropped.

use crate::core::TaskResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Pattern matching `{{ slot_name }}` placeholders in a custom body.
const SLOT_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_-]+)\s*\}\}";

fn slot_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SLOT_PATTERN).expect("slot placeholder pattern is valid"))
}

/// One named slot in the document shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    /// Task name whose result fills this slot.
    pub name: String,
    /// Heading rendered above the slot content.
    pub heading: String,
}

/// The ordered document shape the aggregator fills.
///
/// Either a structured walk over `slots` (title, then one heading per
/// slot), or — when a custom `body` is set — a markdown template whose
/// `{{ slot }}` placeholders are substituted in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    title: String,
    slots: Vec<SlotSpec>,
    body: Option<String>,
}

impl DocumentTemplate {
    /// Create a template with the given title and no slots.
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            slots: Vec::new(),
            body: None,
        }
    }

    /// Append a slot to the shape.
    pub fn with_slot(mut self, name: &str, heading: &str) -> Self {
        self.slots.push(SlotSpec {
            name: name.to_string(),
            heading: heading.to_string(),
        });
        self
    }

    /// Use a custom markdown body with `{{ slot }}` placeholders
    /// instead of the structured walk.
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    /// The document title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The declared slots, in order.
    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    /// Names of all declared slots, in order.
    pub fn slot_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }
}

/// The assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document title.
    pub title: String,
    /// Rendered markdown.
    pub markdown: String,
}

/// Render the content (or placeholder) for one slot.
fn slot_content(results: &HashMap<String, TaskResult>, name: &str) -> String {
    match results.get(name) {
        Some(TaskResult::Success { content }) => content.clone(),
        Some(TaskResult::Failed { error }) => placeholder(&format!("generation failed: {}", error)),
        Some(TaskResult::Skipped { reason }) => placeholder(&format!("skipped: {}", reason)),
        None => placeholder("no result recorded"),
    }
}

fn placeholder(reason: &str) -> String {
    format!("> *[section unavailable: {}]*", reason)
}

/// Merge task results into the final document.
///
/// Every declared slot appears in the output: `Success` content is
/// inserted verbatim, anything else renders as a placeholder carrying
/// the recorded reason. Deterministic for identical inputs.
pub fn aggregate(results: &HashMap<String, TaskResult>, template: &DocumentTemplate) -> Document {
    let markdown = match &template.body {
        Some(body) => slot_regex()
            .replace_all(body, |caps: &regex::Captures<'_>| {
                slot_content(results, &caps[1])
            })
            .into_owned(),
        None => {
            let mut out = format!("# {}\n", template.title);
            for slot in &template.slots {
                out.push_str(&format!(
                    "\n## {}\n\n{}\n",
                    slot.heading,
                    slot_content(results, &slot.name)
                ));
            }
            out
        }
    };

    Document {
        title: template.title.clone(),
        markdown,
    }
}
