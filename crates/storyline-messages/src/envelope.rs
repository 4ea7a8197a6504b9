//! Cucumber Messages envelope shapes.
//!
//! Only the message kinds this codec produces are modelled. Each struct
//! mirrors the protocol's JSON shape (camelCase); optional protocol fields
//! are `Option` and omitted when absent. An [`Envelope`] serializes as an
//! object with exactly one key naming its kind.

use serde::{Deserialize, Serialize};
use storyline_core::{CiInfo, ContentEncoding};

/// Protocol version stamped into `meta`.
pub const PROTOCOL_VERSION: &str = "27.0.0";

// ============================================================================
// TIME
// ============================================================================

/// Wall-clock instant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: ms / 1000,
            nanos: (ms % 1000) as u32 * 1_000_000,
        }
    }

    pub fn to_millis(&self) -> u64 {
        self.seconds
            .saturating_mul(1000)
            .saturating_add(u64::from(self.nanos / 1_000_000))
    }
}

/// Elapsed time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Duration {
    pub seconds: u64,
    pub nanos: u32,
}

impl Duration {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: ms / 1000,
            nanos: (ms % 1000) as u32 * 1_000_000,
        }
    }

    pub fn to_millis(&self) -> u64 {
        self.seconds
            .saturating_mul(1000)
            .saturating_add(u64::from(self.nanos / 1_000_000))
    }
}

// ============================================================================
// META / SOURCE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub protocol_version: String,
    pub implementation: Product,
    pub runtime: Product,
    pub os: Product,
    pub cpu: Product,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<CiInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub uri: String,
    pub data: String,
    pub media_type: String,
}

// ============================================================================
// GHERKIN DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Location {
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            line,
            column: Some(column),
        }
    }
}

/// Step classification shared by document steps and pickle steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeywordType {
    Unknown,
    Context,
    Action,
    Outcome,
    Conjunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub location: Location,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocString {
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub content: String,
    pub delimiter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub location: Location,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub location: Location,
    pub cells: Vec<TableCell>,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataTable {
    pub location: Location,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub location: Location,
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_type: Option<KeywordType>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<DocString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_table: Option<DataTable>,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub location: Location,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub keyword: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub examples: Vec<serde_json::Value>,
    pub id: String,
}

/// A feature child. Backgrounds and rules are carried opaquely for third-party
/// streams; this codec only produces scenarios.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureChild {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub location: Location,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub language: String,
    pub keyword: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub children: Vec<FeatureChild>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GherkinDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<Feature>,
    #[serde(default)]
    pub comments: Vec<serde_json::Value>,
}

// ============================================================================
// PICKLE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickleDocString {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickleTableCell {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickleTableRow {
    pub cells: Vec<PickleTableCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickleTable {
    pub rows: Vec<PickleTableRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickleStepArgument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<PickleDocString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_table: Option<PickleTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickleStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<PickleStepArgument>,
    #[serde(default)]
    pub ast_node_ids: Vec<String>,
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub step_type: Option<KeywordType>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickleTag {
    pub name: String,
    pub ast_node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pickle {
    pub id: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub steps: Vec<PickleStep>,
    #[serde(default)]
    pub tags: Vec<PickleTag>,
    #[serde(default)]
    pub ast_node_ids: Vec<String>,
}

// ============================================================================
// HOOKS
// ============================================================================

/// Where a hook is defined. Producers may add richer references; only the
/// file and line are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookType {
    BeforeTestRun,
    AfterTestRun,
    BeforeTestCase,
    AfterTestCase,
    BeforeTestStep,
    AfterTestStep,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub source_reference: SourceReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_expression: Option<String>,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hook_type: Option<HookType>,
}

// ============================================================================
// EXECUTION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickle_step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_definition_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_match_arguments_lists: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub pickle_id: String,
    #[serde(default)]
    pub test_steps: Vec<TestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_run_started_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunStarted {
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseStarted {
    pub attempt: u32,
    pub id: String,
    pub test_case_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestStepStarted {
    pub test_case_started_id: String,
    pub test_step_id: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Unknown,
    Passed,
    Skipped,
    Pending,
    Undefined,
    Ambiguous,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exception {
    #[serde(rename = "type")]
    pub exception_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestStepResult {
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exception>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestStepFinished {
    pub test_case_started_id: String,
    pub test_step_id: String,
    pub test_step_result: TestStepResult,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseFinished {
    pub test_case_started_id: String,
    pub timestamp: Timestamp,
    pub will_be_retried: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunFinished {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub success: bool,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exception>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_run_started_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub body: String,
    pub content_encoding: ContentEncoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_started_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_run_started_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// One protocol message. Exactly one kind per envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Envelope {
    Meta(Meta),
    Source(Source),
    GherkinDocument(GherkinDocument),
    Pickle(Pickle),
    Hook(Hook),
    TestCase(TestCase),
    TestRunStarted(TestRunStarted),
    TestCaseStarted(TestCaseStarted),
    TestStepStarted(TestStepStarted),
    TestStepFinished(TestStepFinished),
    TestCaseFinished(TestCaseFinished),
    TestRunFinished(TestRunFinished),
    Attachment(Attachment),
}

/// Envelope kinds this codec understands, as their JSON keys.
pub const KNOWN_KINDS: &[&str] = &[
    "meta",
    "source",
    "gherkinDocument",
    "pickle",
    "hook",
    "testCase",
    "testRunStarted",
    "testCaseStarted",
    "testStepStarted",
    "testStepFinished",
    "testCaseFinished",
    "testRunFinished",
    "attachment",
];

impl Envelope {
    /// The JSON key this envelope serializes under.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Meta(_) => "meta",
            Envelope::Source(_) => "source",
            Envelope::GherkinDocument(_) => "gherkinDocument",
            Envelope::Pickle(_) => "pickle",
            Envelope::Hook(_) => "hook",
            Envelope::TestCase(_) => "testCase",
            Envelope::TestRunStarted(_) => "testRunStarted",
            Envelope::TestCaseStarted(_) => "testCaseStarted",
            Envelope::TestStepStarted(_) => "testStepStarted",
            Envelope::TestStepFinished(_) => "testStepFinished",
            Envelope::TestCaseFinished(_) => "testCaseFinished",
            Envelope::TestRunFinished(_) => "testRunFinished",
            Envelope::Attachment(_) => "attachment",
        }
    }

    /// Identifiers this envelope introduces.
    pub fn defined_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        match self {
            Envelope::GherkinDocument(doc) => {
                if let Some(feature) = &doc.feature {
                    ids.extend(feature.tags.iter().map(|t| t.id.as_str()));
                    for scenario in feature.children.iter().filter_map(|c| c.scenario.as_ref()) {
                        ids.push(scenario.id.as_str());
                        ids.extend(scenario.tags.iter().map(|t| t.id.as_str()));
                        for step in &scenario.steps {
                            ids.push(step.id.as_str());
                            if let Some(table) = &step.data_table {
                                ids.extend(table.rows.iter().map(|r| r.id.as_str()));
                            }
                        }
                    }
                }
            }
            Envelope::Pickle(pickle) => {
                ids.push(pickle.id.as_str());
                ids.extend(pickle.steps.iter().map(|s| s.id.as_str()));
            }
            Envelope::Hook(hook) => ids.push(hook.id.as_str()),
            Envelope::TestCase(tc) => {
                ids.push(tc.id.as_str());
                ids.extend(tc.test_steps.iter().map(|s| s.id.as_str()));
            }
            Envelope::TestRunStarted(started) => ids.extend(started.id.as_deref()),
            Envelope::TestCaseStarted(started) => ids.push(started.id.as_str()),
            _ => {}
        }
        ids
    }

    /// Identifiers this envelope points at.
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        match self {
            Envelope::Pickle(pickle) => {
                ids.extend(pickle.ast_node_ids.iter().map(String::as_str));
                for step in &pickle.steps {
                    ids.extend(step.ast_node_ids.iter().map(String::as_str));
                }
                ids.extend(pickle.tags.iter().map(|t| t.ast_node_id.as_str()));
            }
            Envelope::TestCase(tc) => {
                ids.push(tc.pickle_id.as_str());
                ids.extend(tc.test_steps.iter().filter_map(|s| s.pickle_step_id.as_deref()));
                ids.extend(tc.test_steps.iter().filter_map(|s| s.hook_id.as_deref()));
                ids.extend(tc.test_run_started_id.as_deref());
            }
            Envelope::TestCaseStarted(started) => ids.push(started.test_case_id.as_str()),
            Envelope::TestStepStarted(started) => {
                ids.push(started.test_case_started_id.as_str());
                ids.push(started.test_step_id.as_str());
            }
            Envelope::TestStepFinished(finished) => {
                ids.push(finished.test_case_started_id.as_str());
                ids.push(finished.test_step_id.as_str());
            }
            Envelope::TestCaseFinished(finished) => {
                ids.push(finished.test_case_started_id.as_str())
            }
            Envelope::TestRunFinished(finished) => {
                ids.extend(finished.test_run_started_id.as_deref())
            }
            Envelope::Attachment(att) => {
                ids.extend(att.test_case_started_id.as_deref());
                ids.extend(att.test_step_id.as_deref());
                ids.extend(att.test_run_started_id.as_deref());
            }
            _ => {}
        }
        ids
    }
}

/// A reference to an identifier that the stream only defines later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReference {
    /// Position of the referencing envelope.
    pub index: usize,
    pub kind: &'static str,
    pub id: String,
}

/// Find every reference to an id that is first defined later in `envelopes`.
///
/// Ids never defined anywhere are not forward references (pickles keep their
/// AST node ids when synthetic documents are left out).
pub fn forward_references(envelopes: &[Envelope]) -> Vec<ForwardReference> {
    use std::collections::{BTreeMap, BTreeSet};

    let mut first_defined: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, env) in envelopes.iter().enumerate() {
        for id in env.defined_ids() {
            first_defined.entry(id).or_insert(i);
        }
    }

    let mut found = Vec::new();
    let mut reported = BTreeSet::new();
    for (i, env) in envelopes.iter().enumerate() {
        for id in env.referenced_ids() {
            if let Some(&def) = first_defined.get(id) {
                if def > i && reported.insert((i, id)) {
                    found.push(ForwardReference {
                        index: i,
                        kind: env.kind(),
                        id: id.to_string(),
                    });
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_split_milliseconds() {
        let ts = Timestamp::from_millis(1_700_000_001_250);
        assert_eq!(ts.seconds, 1_700_000_001);
        assert_eq!(ts.nanos, 250_000_000);
        assert_eq!(ts.to_millis(), 1_700_000_001_250);
        assert_eq!(Duration::from_millis(999).to_millis(), 999);
    }

    #[test]
    fn out_of_range_times_saturate() {
        let ts = Timestamp {
            seconds: u64::MAX,
            nanos: 999_999_999,
        };
        assert_eq!(ts.to_millis(), u64::MAX);
        let d = Duration {
            seconds: u64::MAX / 1000,
            nanos: 999_000_000,
        };
        assert_eq!(d.to_millis(), u64::MAX);
    }

    #[test]
    fn envelope_serializes_under_single_camel_case_key() {
        let env = Envelope::TestRunStarted(TestRunStarted {
            timestamp: Timestamp::from_millis(2500),
            id: Some("run-1".into()),
        });
        let json = serde_json::to_value(&env).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(
            json["testRunStarted"]["timestamp"],
            serde_json::json!({ "seconds": 2, "nanos": 500_000_000 })
        );
        assert_eq!(env.kind(), "testRunStarted");
        assert!(KNOWN_KINDS.contains(&env.kind()));
    }

    #[test]
    fn step_status_uses_protocol_casing() {
        let result = TestStepResult {
            duration: Duration::default(),
            message: None,
            status: StepStatus::Failed,
            exception: Some(Exception {
                exception_type: "Error".into(),
                message: Some("boom".into()),
                stack_trace: None,
            }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["exception"]["type"], "Error");
    }

    #[test]
    fn forward_references_are_detected() {
        let case = Envelope::TestCaseStarted(TestCaseStarted {
            attempt: 0,
            id: "tcs".into(),
            test_case_id: "tc".into(),
            worker_id: None,
            timestamp: Timestamp::default(),
        });
        let def = Envelope::TestCase(TestCase {
            id: "tc".into(),
            pickle_id: "p".into(),
            test_steps: vec![],
            test_run_started_id: None,
        });

        assert!(forward_references(&[def.clone(), case.clone()]).is_empty());
        let refs = forward_references(&[case, def]);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "tc");
        assert_eq!(refs[0].kind, "testCaseStarted");
    }

    #[test]
    fn hooks_parse_leniently_and_are_referenced_by_test_steps() {
        let hook: Envelope = serde_json::from_str(
            r#"{"hook":{"id":"h1","type":"AFTER_TEST_CASE","sourceReference":{"javaMethod":{"className":"X"}}}}"#,
        )
        .unwrap();
        let Envelope::Hook(parsed) = &hook else {
            panic!("expected hook, got {hook:?}");
        };
        assert_eq!(parsed.hook_type, Some(HookType::AfterTestCase));
        assert_eq!(parsed.source_reference, SourceReference::default());
        assert_eq!(hook.defined_ids(), vec!["h1"]);

        let case = Envelope::TestCase(TestCase {
            id: "tc".into(),
            pickle_id: "p".into(),
            test_steps: vec![TestStep {
                id: "ts".into(),
                pickle_step_id: None,
                hook_id: Some("h1".into()),
                step_definition_ids: None,
                step_match_arguments_lists: None,
            }],
            test_run_started_id: None,
        });
        assert!(case.referenced_ids().contains(&"h1"));
        assert_eq!(forward_references(&[case, hook]).len(), 1);
    }
}
