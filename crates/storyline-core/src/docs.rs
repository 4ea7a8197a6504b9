//! Documentation entries attached to scenarios and steps.
//!
//! A [`DocEntry`] is a typed annotation (note, table, code block, screenshot,
//! ...) that an author attaches either to a whole scenario or to a single
//! step. Entries are independent of the pass/fail outcome and keep the order
//! the author gave them within their attachment point.

use serde::{Deserialize, Serialize};

/// When the entry was produced: declared up front or recorded while running.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocPhase {
    #[default]
    Static,
    Runtime,
}

/// A single documentation entry. The set of kinds is closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocEntry {
    /// Free-form prose.
    Note {
        text: String,
        #[serde(default)]
        phase: DocPhase,
    },

    /// Extra tag names contributed from inside the scenario body.
    Tag {
        names: Vec<String>,
        #[serde(default)]
        phase: DocPhase,
    },

    /// A labelled value of arbitrary JSON shape.
    Kv {
        label: String,
        value: serde_json::Value,
        #[serde(default)]
        phase: DocPhase,
    },

    /// A code block with an optional language / media type.
    Code {
        label: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(default)]
        phase: DocPhase,
    },

    /// A table with a header row and data rows.
    Table {
        label: String,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        #[serde(default)]
        phase: DocPhase,
    },

    /// A hyperlink.
    Link {
        label: String,
        url: String,
        #[serde(default)]
        phase: DocPhase,
    },

    /// A titled markdown section.
    Section {
        title: String,
        markdown: String,
        #[serde(default)]
        phase: DocPhase,
    },

    /// A mermaid diagram.
    Mermaid {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default)]
        phase: DocPhase,
    },

    /// An image reference: a file path, URL or `data:` URI.
    Screenshot {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
        #[serde(default)]
        phase: DocPhase,
    },

    /// Caller-defined payload.
    Custom {
        #[serde(rename = "type")]
        custom_type: String,
        data: serde_json::Value,
        #[serde(default)]
        phase: DocPhase,
    },
}

impl DocEntry {
    /// Stable lowercase name of the entry kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DocEntry::Note { .. } => "note",
            DocEntry::Tag { .. } => "tag",
            DocEntry::Kv { .. } => "kv",
            DocEntry::Code { .. } => "code",
            DocEntry::Table { .. } => "table",
            DocEntry::Link { .. } => "link",
            DocEntry::Section { .. } => "section",
            DocEntry::Mermaid { .. } => "mermaid",
            DocEntry::Screenshot { .. } => "screenshot",
            DocEntry::Custom { .. } => "custom",
        }
    }

    pub fn note(text: impl Into<String>) -> Self {
        DocEntry::Note {
            text: text.into(),
            phase: DocPhase::Static,
        }
    }

    pub fn code(label: impl Into<String>, content: impl Into<String>, lang: Option<&str>) -> Self {
        DocEntry::Code {
            label: label.into(),
            content: content.into(),
            lang: lang.map(str::to_string),
            phase: DocPhase::Static,
        }
    }

    pub fn table(label: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        DocEntry::Table {
            label: label.into(),
            columns,
            rows,
            phase: DocPhase::Static,
        }
    }

    pub fn screenshot(path: impl Into<String>) -> Self {
        DocEntry::Screenshot {
            path: path.into(),
            alt: None,
            phase: DocPhase::Static,
        }
    }

    /// True for kinds that can be rendered as a step doc-string.
    pub fn is_doc_string_like(&self) -> bool {
        matches!(
            self,
            DocEntry::Code { .. }
                | DocEntry::Note { .. }
                | DocEntry::Section { .. }
                | DocEntry::Mermaid { .. }
                | DocEntry::Kv { .. }
                | DocEntry::Link { .. }
                | DocEntry::Custom { .. }
        )
    }
}
