//! Raw (permissive) and canonical (strict) test-run models.
//!
//! Adapters for concrete test frameworks produce a [`RawRun`]; every field a
//! framework may fail to report is optional there. The canonicalizer turns
//! it into a [`TestRunResult`] in which every field is resolved.
//!
//! # Canonical invariants
//!
//! - `step_results.len() == story.steps.len()` and indices are exactly
//!   `0..steps.len()`.
//! - `tags` is deduplicated and sorted.
//! - `attempts`, when present, holds more than one attempt ordered from 0 and
//!   the case's top-level status/duration/error mirror the final one.
//! - `id` and `run_id` are deterministic functions of their inputs.

use serde::{Deserialize, Serialize};

use crate::docs::DocEntry;

/// Current canonical schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// SHARED
// ============================================================================

/// The canonical four-state outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Pending,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Pending => "pending",
        }
    }

    /// Rank for picking the worst of several outcomes:
    /// passed < skipped < pending < failed.
    pub fn severity(&self) -> u8 {
        match self {
            TestStatus::Passed => 0,
            TestStatus::Skipped => 1,
            TestStatus::Pending => 2,
            TestStatus::Failed => 3,
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an attachment body is encoded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentEncoding {
    #[default]
    Base64,
    Identity,
}

/// Git coordinates reported by CI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// CI environment the run executed in. Resolved by the caller, never read
/// from the process environment here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
}

// ============================================================================
// RAW INPUT
// ============================================================================

/// Error text as reported by a framework.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

/// One step as authored in a story annotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    #[serde(default)]
    pub keyword: String,
    pub text: String,
    #[serde(default)]
    pub docs: Vec<DocEntry>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Narrative metadata for a test case.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawStory {
    pub scenario: String,
    #[serde(default)]
    pub steps: Vec<RawStep>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tickets: Vec<String>,
    #[serde(default)]
    pub docs: Vec<DocEntry>,
    #[serde(default)]
    pub suite_path: Option<Vec<String>>,
}

/// Attachment as reported: inline body, a file path, or neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub encoding: Option<ContentEncoding>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub byte_length: Option<u64>,
}

/// Partial per-step outcome supplied by a framework.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawStepEvent {
    /// Step index; the event's position in the list when absent.
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_stack: Option<String>,
}

/// One execution of a test case under a retry policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawAttempt {
    #[serde(default)]
    pub attempt: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<RawError>,
}

/// A test case as harvested by a framework adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTestCase {
    #[serde(default)]
    pub title: Option<String>,
    /// Full framework title path, usually ending with the test title.
    #[serde(default)]
    pub title_path: Option<Vec<String>>,
    #[serde(default)]
    pub story: Option<RawStory>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub source_line: Option<u32>,
    /// Open vocabulary: pass, fail, skip, todo, pending, timeout, ...
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<RawError>,
    #[serde(default)]
    pub attachments: Vec<RawAttachment>,
    #[serde(default)]
    pub step_events: Vec<RawStepEvent>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub retry: Option<u32>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub attempts: Vec<RawAttempt>,
    #[serde(default)]
    pub project_name: Option<String>,
}

/// A whole run as harvested by a framework adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawRun {
    #[serde(default)]
    pub test_cases: Vec<RawTestCase>,
    #[serde(default)]
    pub started_at_ms: Option<u64>,
    #[serde(default)]
    pub finished_at_ms: Option<u64>,
    pub project_root: String,
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(default)]
    pub git_sha: Option<String>,
    #[serde(default)]
    pub ci: Option<CiInfo>,
}

// ============================================================================
// CANONICAL MODEL
// ============================================================================

/// Gherkin step keyword.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKeyword {
    /// Case-insensitive match; anything unrecognised becomes `And`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "given" => StepKeyword::Given,
            "when" => StepKeyword::When,
            "then" => StepKeyword::Then,
            "but" => StepKeyword::But,
            _ => StepKeyword::And,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
        }
    }

    pub fn is_conjunction(&self) -> bool {
        matches!(self, StepKeyword::And | StepKeyword::But)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryStep {
    pub keyword: StepKeyword,
    pub text: String,
    #[serde(default)]
    pub docs: Vec<DocEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StoryStep {
    pub fn new(keyword: StepKeyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            docs: Vec::new(),
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryMeta {
    pub scenario: String,
    pub steps: Vec<StoryStep>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tickets: Vec<String>,
    #[serde(default)]
    pub docs: Vec<DocEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_path: Option<Vec<String>>,
}

/// A resolved attachment. `body` is always present; an empty string when
/// nothing could be resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub body: String,
    pub content_encoding: ContentEncoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub index: usize,
    pub status: TestStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseAttempt {
    pub attempt: u32,
    pub status: TestStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub id: String,
    pub story: StoryMeta,
    pub source_file: String,
    pub source_line: u32,
    pub status: TestStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
    pub attachments: Vec<Attachment>,
    pub step_results: Vec<StepResult>,
    pub tags: Vec<String>,
    pub title_path: Vec<String>,
    pub retry: u32,
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Vec<TestCaseAttempt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    pub schema_version: u32,
    pub run_id: String,
    pub project_root: String,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub duration_ms: u64,
    pub test_cases: Vec<TestCaseResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<CiInfo>,
}

impl TestRunResult {
    /// True when every case's final status is `passed`.
    pub fn success(&self) -> bool {
        self.test_cases
            .iter()
            .all(|tc| tc.status == TestStatus::Passed)
    }
}
