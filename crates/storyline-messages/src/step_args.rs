//! Step keyword typing and step arguments.
//!
//! Shared by the document builder, the pickle builder and the decoder so the
//! two encoded forms of a step can never disagree.

use storyline_core::{DocEntry, DocPhase, StepKeyword, StoryStep};

use crate::envelope::KeywordType;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_MARKDOWN: &str = "text/markdown";
pub const TEXT_MERMAID: &str = "text/x-mermaid";
pub const APPLICATION_JSON: &str = "application/json";

/// Effective type of each step. `And`/`But` inherit the nearest preceding
/// non-conjunction step's type; with nothing to inherit they are `Unknown`.
pub fn keyword_types(steps: &[StoryStep]) -> Vec<KeywordType> {
    let mut last = None;
    steps
        .iter()
        .map(|step| match own_type(step.keyword) {
            Some(ty) => {
                last = Some(ty);
                ty
            }
            None => last.unwrap_or(KeywordType::Unknown),
        })
        .collect()
}

fn own_type(keyword: StepKeyword) -> Option<KeywordType> {
    match keyword {
        StepKeyword::Given => Some(KeywordType::Context),
        StepKeyword::When => Some(KeywordType::Action),
        StepKeyword::Then => Some(KeywordType::Outcome),
        StepKeyword::And | StepKeyword::But => None,
    }
}

/// Canonical keyword for a resolved step type.
pub fn keyword_for_type(ty: Option<KeywordType>) -> StepKeyword {
    match ty {
        Some(KeywordType::Context) => StepKeyword::Given,
        Some(KeywordType::Action) => StepKeyword::When,
        Some(KeywordType::Outcome) => StepKeyword::Then,
        _ => StepKeyword::And,
    }
}

/// The single argument a step carries in the protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum StepArgument {
    DocString {
        content: String,
        media_type: Option<String>,
    },
    /// Header row first, then data rows.
    DataTable { rows: Vec<Vec<String>> },
}

/// Pick a step's argument from its documentation entries. A table wins over
/// any doc-string-like entry; among doc-string-like entries the first wins.
/// Screenshots and tags never become arguments.
pub fn step_argument(docs: &[DocEntry]) -> Option<StepArgument> {
    docs.iter()
        .find_map(table_argument)
        .or_else(|| docs.iter().find_map(doc_string_argument))
}

fn table_argument(doc: &DocEntry) -> Option<StepArgument> {
    let DocEntry::Table { columns, rows, .. } = doc else {
        return None;
    };
    if columns.is_empty() && rows.is_empty() {
        return None;
    }
    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(columns.len()))
        .max()
        .unwrap_or(0);
    let pad = |row: &Vec<String>| {
        let mut row = row.clone();
        row.resize(width, String::new());
        row
    };
    let mut all = Vec::with_capacity(rows.len() + 1);
    all.push(pad(columns));
    all.extend(rows.iter().map(pad));
    Some(StepArgument::DataTable { rows: all })
}

fn doc_string_argument(doc: &DocEntry) -> Option<StepArgument> {
    let (content, media_type) = match doc {
        DocEntry::Code { content, lang, .. } => (content.clone(), lang.clone()),
        DocEntry::Note { text, .. } => (text.clone(), Some(TEXT_PLAIN.to_string())),
        DocEntry::Section {
            title, markdown, ..
        } => {
            let content = if title.trim().is_empty() {
                markdown.clone()
            } else {
                format!("## {title}\n\n{markdown}")
            };
            (content, Some(TEXT_MARKDOWN.to_string()))
        }
        DocEntry::Mermaid { code, .. } => (code.clone(), Some(TEXT_MERMAID.to_string())),
        DocEntry::Kv { label, value, .. } => {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (format!("{label}: {value}"), Some(TEXT_PLAIN.to_string()))
        }
        DocEntry::Link { label, url, .. } => {
            (format!("{label}: {url}"), Some(TEXT_PLAIN.to_string()))
        }
        DocEntry::Custom { data, .. } => (
            serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
            Some(APPLICATION_JSON.to_string()),
        ),
        DocEntry::Tag { .. } | DocEntry::Table { .. } | DocEntry::Screenshot { .. } => {
            return None
        }
    };
    Some(StepArgument::DocString {
        content,
        media_type,
    })
}

/// Rebuild a documentation entry from a decoded doc string.
pub fn doc_from_doc_string(content: &str, media_type: Option<&str>) -> DocEntry {
    match media_type {
        Some(TEXT_PLAIN) => DocEntry::note(content),
        Some(TEXT_MARKDOWN) => {
            let (title, markdown) = split_markdown_heading(content);
            DocEntry::Section {
                title,
                markdown,
                phase: DocPhase::Static,
            }
        }
        Some(TEXT_MERMAID) => DocEntry::Mermaid {
            code: content.to_string(),
            title: None,
            phase: DocPhase::Static,
        },
        other => DocEntry::code("", content, other),
    }
}

fn split_markdown_heading(content: &str) -> (String, String) {
    match content.strip_prefix("## ") {
        Some(rest) => {
            let (title, body) = rest.split_once('\n').unwrap_or((rest, ""));
            let body = body.strip_prefix('\n').unwrap_or(body);
            (title.to_string(), body.to_string())
        }
        None => (String::new(), content.to_string()),
    }
}

/// Rebuild a table entry from decoded rows; the first row is the header.
pub fn doc_from_table(rows: Vec<Vec<String>>) -> DocEntry {
    let mut rows = rows.into_iter();
    let columns = rows.next().unwrap_or_default();
    DocEntry::table("", columns, rows.collect())
}
