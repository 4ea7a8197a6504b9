//! Envelope stream decoding.
//!
//! The decoder never assumes stream order: it indexes every envelope first
//! and only then resolves references. Structural problems (invalid JSON, a
//! line that is not a single-key object, a known envelope kind with missing
//! fields, a reference to an id that is never defined) are errors. Envelope
//! kinds this codec does not model are skipped.

use std::collections::{BTreeSet, HashMap};

use storyline_core::{
    obs, Attachment as CaseAttachment, ContentEncoding, DocEntry, IdGenerator, IdKind,
    StepKeyword, StepResult, StoryMeta, StoryStep, TestCaseAttempt, TestCaseResult,
    TestRunResult, TestStatus, SCHEMA_VERSION,
};
use tracing::debug;

use crate::envelope::{
    Attachment, Envelope, GherkinDocument, Meta, Pickle, PickleStep, StepStatus, TestCase,
    TestCaseFinished, TestCaseStarted, TestRunFinished, TestRunStarted, TestStepFinished,
    KNOWN_KINDS,
};
use crate::error::{MessagesError, Result};
use crate::execution::data_uri;
use crate::step_args::{doc_from_doc_string, doc_from_table, keyword_for_type};

/// Name given to case attachments that arrive without a file name.
pub const UNNAMED_ATTACHMENT: &str = "attachment";

/// Decoder configuration.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Project root recorded on the decoded run.
    pub project_root: String,
    /// Salt for recomputing canonical case ids; match the canonicalizer's.
    pub id_salt: String,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            project_root: ".".to_string(),
            id_salt: String::new(),
        }
    }
}

impl DecodeOptions {
    pub fn with_project_root(mut self, root: impl Into<String>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_id_salt(mut self, salt: impl Into<String>) -> Self {
        self.id_salt = salt.into();
        self
    }
}

/// Parse NDJSON into envelopes. Blank lines are ignored; line numbers in
/// errors are 1-based.
pub fn parse_ndjson(input: &str) -> Result<Vec<Envelope>> {
    let mut envelopes = Vec::new();
    for (i, raw) in input.lines().enumerate() {
        let line = i + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|source| MessagesError::InvalidJson { line, source })?;
        let kind = match value.as_object() {
            Some(obj) if obj.len() == 1 => obj.keys().next().cloned().unwrap_or_default(),
            _ => return Err(MessagesError::NotSingleKey { line }),
        };
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            debug!(line = line, kind = %kind, "skipping unsupported envelope kind");
            continue;
        }
        let envelope = serde_json::from_value(value)
            .map_err(|source| MessagesError::MalformedEnvelope { line, kind, source })?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

/// Decode an NDJSON stream into a canonical run.
pub fn decode_ndjson(input: &str, options: &DecodeOptions) -> Result<TestRunResult> {
    decode_envelopes(&parse_ndjson(input)?, options)
}

/// Everything the resolver needs, keyed by id.
#[derive(Default)]
struct StreamIndex<'a> {
    meta: Option<&'a Meta>,
    documents: HashMap<&'a str, &'a GherkinDocument>,
    doc_steps: HashMap<&'a str, &'a str>,
    pickles: HashMap<&'a str, &'a Pickle>,
    test_cases: Vec<&'a TestCase>,
    started_by_case: HashMap<&'a str, Vec<&'a TestCaseStarted>>,
    started_ids: BTreeSet<&'a str>,
    hooks: BTreeSet<&'a str>,
    test_step_ids: BTreeSet<&'a str>,
    step_started: Vec<(&'a str, &'a str)>,
    finished: HashMap<&'a str, &'a TestCaseFinished>,
    step_finished: HashMap<(&'a str, &'a str), &'a TestStepFinished>,
    attachments: HashMap<&'a str, Vec<&'a Attachment>>,
    run_started: Option<&'a TestRunStarted>,
    run_finished: Option<&'a TestRunFinished>,
}

impl<'a> StreamIndex<'a> {
    fn build(envelopes: &'a [Envelope]) -> Result<Self> {
        let mut index = StreamIndex::default();
        for envelope in envelopes {
            match envelope {
                Envelope::Meta(meta) => index.meta = Some(meta),
                Envelope::Source(_) => {}
                Envelope::GherkinDocument(doc) => index.add_document(doc),
                Envelope::Pickle(pickle) => {
                    index.pickles.insert(pickle.id.as_str(), pickle);
                }
                Envelope::Hook(hook) => {
                    index.hooks.insert(hook.id.as_str());
                }
                Envelope::TestCase(tc) => {
                    index
                        .test_step_ids
                        .extend(tc.test_steps.iter().map(|s| s.id.as_str()));
                    index.test_cases.push(tc);
                }
                Envelope::TestRunStarted(started) => index.run_started = Some(started),
                Envelope::TestCaseStarted(started) => {
                    index.started_ids.insert(started.id.as_str());
                    index
                        .started_by_case
                        .entry(started.test_case_id.as_str())
                        .or_default()
                        .push(started);
                }
                Envelope::TestStepStarted(started) => index.step_started.push((
                    started.test_case_started_id.as_str(),
                    started.test_step_id.as_str(),
                )),
                Envelope::TestStepFinished(finished) => {
                    index.step_finished.insert(
                        (
                            finished.test_case_started_id.as_str(),
                            finished.test_step_id.as_str(),
                        ),
                        finished,
                    );
                }
                Envelope::TestCaseFinished(finished) => {
                    index
                        .finished
                        .insert(finished.test_case_started_id.as_str(), finished);
                }
                Envelope::TestRunFinished(finished) => index.run_finished = Some(finished),
                Envelope::Attachment(att) => match att.test_case_started_id.as_deref() {
                    Some(started_id) => index.attachments.entry(started_id).or_default().push(att),
                    None => debug!("skipping attachment not tied to a test case"),
                },
            }
        }
        index.check_references()?;
        Ok(index)
    }

    fn add_document(&mut self, doc: &'a GherkinDocument) {
        if let Some(uri) = doc.uri.as_deref() {
            self.documents.insert(uri, doc);
        }
        let Some(feature) = &doc.feature else {
            return;
        };
        for scenario in feature.children.iter().filter_map(|c| c.scenario.as_ref()) {
            for step in &scenario.steps {
                self.doc_steps.insert(step.id.as_str(), step.keyword.as_str());
            }
        }
    }

    fn check_references(&self) -> Result<()> {
        let known_cases: BTreeSet<&str> = self.test_cases.iter().map(|tc| tc.id.as_str()).collect();
        if let Some(case_id) = self
            .started_by_case
            .keys()
            .find(|id| !known_cases.contains(*id))
        {
            return Err(dangling("testCase", case_id));
        }
        let hook_refs = self
            .test_cases
            .iter()
            .flat_map(|tc| tc.test_steps.iter())
            .filter_map(|s| s.hook_id.as_deref());
        for hook_id in hook_refs {
            if !self.hooks.contains(hook_id) {
                return Err(dangling("hook", hook_id));
            }
        }
        let step_refs = self
            .step_finished
            .keys()
            .copied()
            .chain(self.step_started.iter().copied());
        for (started_id, step_id) in step_refs {
            if !self.started_ids.contains(started_id) {
                return Err(dangling("testCaseStarted", started_id));
            }
            if !self.test_step_ids.contains(step_id) {
                return Err(dangling("testStep", step_id));
            }
        }
        let started_refs = self.finished.keys().chain(self.attachments.keys());
        for started_id in started_refs {
            if !self.started_ids.contains(started_id) {
                return Err(dangling("testCaseStarted", started_id));
            }
        }
        Ok(())
    }
}

fn dangling(kind: &'static str, id: &str) -> MessagesError {
    MessagesError::DanglingReference {
        kind,
        id: id.to_string(),
    }
}

fn canonical_status(status: StepStatus) -> TestStatus {
    match status {
        StepStatus::Passed => TestStatus::Passed,
        StepStatus::Failed | StepStatus::Undefined | StepStatus::Ambiguous => TestStatus::Failed,
        StepStatus::Pending => TestStatus::Pending,
        StepStatus::Skipped | StepStatus::Unknown => TestStatus::Skipped,
    }
}

/// The worst result decides the attempt; an attempt with no results passed.
fn attempt_status<'r>(results: impl IntoIterator<Item = &'r StepResult>) -> TestStatus {
    results
        .into_iter()
        .map(|r| r.status)
        .max_by_key(TestStatus::severity)
        .unwrap_or(TestStatus::Passed)
}

/// One decoded attempt sequence.
struct DecodedAttempt<'a> {
    started: &'a TestCaseStarted,
    duration_ms: u64,
    steps: Vec<StepResult>,
    /// Results of test steps that run no pickle step (hooks).
    hooks: Vec<StepResult>,
}

impl DecodedAttempt<'_> {
    fn status(&self) -> TestStatus {
        attempt_status(self.steps.iter().chain(&self.hooks))
    }

    fn failure(&self) -> (Option<String>, Option<String>) {
        self.steps
            .iter()
            .chain(&self.hooks)
            .find(|s| s.status == TestStatus::Failed)
            .map(|s| (s.error_message.clone(), s.error_stack.clone()))
            .unwrap_or((None, None))
    }
}

/// Decode envelopes (in any order) into a canonical run.
pub fn decode_envelopes(envelopes: &[Envelope], options: &DecodeOptions) -> Result<TestRunResult> {
    let index = StreamIndex::build(envelopes)?;
    let ids = IdGenerator::new(options.id_salt.clone());

    let started_at_ms = index.run_started.map_or(0, |s| s.timestamp.to_millis());
    let finished_at_ms = index
        .run_finished
        .map_or(started_at_ms, |f| f.timestamp.to_millis())
        .max(started_at_ms);
    let run_id = index
        .run_started
        .and_then(|s| s.id.clone())
        .unwrap_or_else(|| {
            ids.id(
                IdKind::Run,
                &[started_at_ms.to_string(), options.project_root.clone()],
            )
        });

    let _span = obs::RunSpan::enter(&run_id);
    let test_cases = index
        .test_cases
        .iter()
        .map(|tc| decode_case(tc, &index, &ids))
        .collect::<Result<Vec<_>>>()?;

    obs::emit_stream_decoded(&run_id, envelopes.len(), test_cases.len());
    Ok(TestRunResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        project_root: options.project_root.clone(),
        started_at_ms,
        finished_at_ms,
        duration_ms: finished_at_ms - started_at_ms,
        test_cases,
        package_version: None,
        git_sha: None,
        ci: index.meta.and_then(|m| m.ci.clone()),
    })
}

fn decode_case(tc: &TestCase, index: &StreamIndex<'_>, ids: &IdGenerator) -> Result<TestCaseResult> {
    let pickle = index
        .pickles
        .get(tc.pickle_id.as_str())
        .copied()
        .ok_or_else(|| dangling("pickle", &tc.pickle_id))?;

    // testStep id -> pickle step index
    let mut step_index: HashMap<&str, usize> = HashMap::new();
    let mut hook_steps: Vec<&str> = Vec::new();
    for test_step in &tc.test_steps {
        let Some(pickle_step_id) = test_step.pickle_step_id.as_deref() else {
            hook_steps.push(test_step.id.as_str());
            continue;
        };
        let position = pickle
            .steps
            .iter()
            .position(|s| s.id == pickle_step_id)
            .ok_or_else(|| dangling("pickleStep", pickle_step_id))?;
        step_index.insert(test_step.id.as_str(), position);
    }

    let steps: Vec<StoryStep> = pickle
        .steps
        .iter()
        .map(|step| decode_step(step, index))
        .collect();

    let mut started = index
        .started_by_case
        .get(tc.id.as_str())
        .cloned()
        .unwrap_or_default();
    started.sort_by_key(|s| s.attempt);

    let attempts: Vec<DecodedAttempt<'_>> = started
        .iter()
        .map(|s| decode_attempt(s, &step_index, &hook_steps, steps.len(), index))
        .collect();

    let mut steps = steps;
    let mut attachments = Vec::new();
    for attempt in &attempts {
        for att in index
            .attachments
            .get(attempt.started.id.as_str())
            .into_iter()
            .flatten()
        {
            place_attachment(att, &step_index, &hook_steps, &mut steps, &mut attachments)?;
        }
    }

    let (status, duration_ms, error_message, error_stack, step_results, retry) =
        match attempts.last() {
            Some(last) => {
                let (message, stack) = last.failure();
                (
                    last.status(),
                    last.duration_ms,
                    message,
                    stack,
                    last.steps.clone(),
                    last.started.attempt,
                )
            }
            None => (
                TestStatus::Skipped,
                0,
                None,
                None,
                skipped_steps(steps.len()),
                0,
            ),
        };

    let canonical_attempts = (attempts.len() > 1).then(|| {
        attempts
            .iter()
            .map(|a| {
                let (error_message, error_stack) = a.failure();
                TestCaseAttempt {
                    attempt: a.started.attempt,
                    status: a.status(),
                    duration_ms: a.duration_ms,
                    error_message,
                    error_stack,
                }
            })
            .collect::<Vec<_>>()
    });

    let tags: Vec<String> = pickle
        .tags
        .iter()
        .map(|t| t.name.trim().trim_start_matches('@').to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let title_path = index
        .documents
        .get(pickle.uri.as_str())
        .and_then(|doc| doc.feature.as_ref())
        .map(|f| vec![f.name.clone()])
        .unwrap_or_default();

    Ok(TestCaseResult {
        id: ids.id(IdKind::TestCase, &[pickle.uri.as_str(), pickle.name.as_str()]),
        story: StoryMeta {
            scenario: pickle.name.clone(),
            steps,
            tags: tags.clone(),
            tickets: Vec::new(),
            docs: Vec::new(),
            suite_path: None,
        },
        source_file: pickle.uri.clone(),
        source_line: pickle.location.map_or(1, |l| l.line.max(1)),
        status,
        duration_ms,
        error_message,
        error_stack,
        attachments,
        step_results,
        tags,
        title_path,
        retry,
        retries: retry,
        attempts: canonical_attempts,
        project_name: None,
    })
}

fn decode_step(step: &PickleStep, index: &StreamIndex<'_>) -> StoryStep {
    let keyword = step
        .ast_node_ids
        .iter()
        .find_map(|id| index.doc_steps.get(id.as_str()))
        .map(|kw| StepKeyword::parse(kw))
        .unwrap_or_else(|| keyword_for_type(step.step_type));

    let mut decoded = StoryStep::new(keyword, step.text.clone());
    if let Some(argument) = &step.argument {
        if let Some(table) = &argument.data_table {
            let rows = table
                .rows
                .iter()
                .map(|r| r.cells.iter().map(|c| c.value.clone()).collect())
                .collect();
            decoded.docs.push(doc_from_table(rows));
        } else if let Some(doc_string) = &argument.doc_string {
            decoded.docs.push(doc_from_doc_string(
                &doc_string.content,
                doc_string.media_type.as_deref(),
            ));
        }
    }
    decoded
}

fn decode_attempt<'a>(
    started: &'a TestCaseStarted,
    step_index: &HashMap<&str, usize>,
    hook_steps: &[&str],
    step_count: usize,
    index: &StreamIndex<'_>,
) -> DecodedAttempt<'a> {
    let finished_step =
        |test_step_id: &str| index.step_finished.get(&(started.id.as_str(), test_step_id)).copied();

    let mut steps = skipped_steps(step_count);
    for (test_step_id, &i) in step_index {
        if let Some(finished) = finished_step(*test_step_id) {
            steps[i] = step_result(i, finished);
        }
    }
    let hooks = hook_steps
        .iter()
        .filter_map(|id| finished_step(*id))
        .map(|finished| step_result(0, finished))
        .collect();

    let duration_ms = index
        .finished
        .get(started.id.as_str())
        .map_or(0, |f| {
            f.timestamp
                .to_millis()
                .saturating_sub(started.timestamp.to_millis())
        });

    DecodedAttempt {
        started,
        duration_ms,
        steps,
        hooks,
    }
}

fn step_result(index: usize, finished: &TestStepFinished) -> StepResult {
    let result = &finished.test_step_result;
    let status = canonical_status(result.status);
    let exception = result.exception.as_ref();
    StepResult {
        index,
        status,
        duration_ms: result.duration.to_millis(),
        error_message: result
            .message
            .clone()
            .or_else(|| exception.and_then(|e| e.message.clone()))
            .filter(|_| status == TestStatus::Failed),
        error_stack: exception.and_then(|e| e.stack_trace.clone()),
    }
}

fn skipped_steps(count: usize) -> Vec<StepResult> {
    (0..count)
        .map(|index| StepResult {
            index,
            status: TestStatus::Skipped,
            duration_ms: 0,
            error_message: None,
            error_stack: None,
        })
        .collect()
}

/// Named attachments are case attachments. Unnamed images tied to a step
/// become that step's screenshot; anything else, including whatever a hook
/// attached, is a case attachment.
fn place_attachment(
    att: &Attachment,
    step_index: &HashMap<&str, usize>,
    hook_steps: &[&str],
    steps: &mut [StoryStep],
    attachments: &mut Vec<CaseAttachment>,
) -> Result<()> {
    let step = match att.test_step_id.as_deref() {
        Some(id) => match step_index.get(id) {
            Some(&i) => Some(i),
            None if hook_steps.contains(&id) => None,
            None => return Err(dangling("testStep", id)),
        },
        None => None,
    };

    if att.file_name.is_none() && att.media_type.starts_with("image/") {
        if let Some(i) = step {
            let path = match att.content_encoding {
                ContentEncoding::Base64 => data_uri(&att.media_type, &att.body),
                ContentEncoding::Identity => att.body.clone(),
            };
            steps[i].docs.push(DocEntry::screenshot(path));
            return Ok(());
        }
    }

    attachments.push(CaseAttachment {
        name: att
            .file_name
            .clone()
            .unwrap_or_else(|| UNNAMED_ATTACHMENT.to_string()),
        media_type: att.media_type.clone(),
        body: att.body.clone(),
        content_encoding: att.content_encoding,
        path: None,
        byte_length: None,
    });
    Ok(())
}
