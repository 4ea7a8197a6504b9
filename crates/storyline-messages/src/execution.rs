//! Execution envelopes: test cases, attempt sequences and attachments.
//!
//! Timestamps come from a single running clock that starts at the run's
//! start time and only moves forward: a step starts at the current clock and
//! finishes once its duration has been added. A case finishes at its start
//! plus the larger of its own duration and the sum of its step durations.

use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;
use storyline_core::{
    guess_media_type, Attachment as CaseAttachment, ContentEncoding, DocEntry, TestCaseResult,
    TestStatus,
};

use crate::envelope::{
    Attachment, Duration, Envelope, Exception, Hook, HookType, SourceReference, StepStatus,
    TestCase, TestCaseFinished, TestCaseStarted, TestStep, TestStepFinished, TestStepResult,
    TestStepStarted, Timestamp,
};
use crate::scope::{MessageIds, ScopedCase};

/// Media type of a screenshot whose type cannot be told from its path.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

/// `type` reported on step exceptions.
pub const EXCEPTION_TYPE: &str = "Error";

/// Name of the hook that reports scenario outcomes no step accounts for.
pub const OUTCOME_HOOK_NAME: &str = "scenario outcome";

/// Protocol status for a canonical status.
pub fn step_status(status: TestStatus) -> StepStatus {
    match status {
        TestStatus::Passed => StepStatus::Passed,
        TestStatus::Failed => StepStatus::Failed,
        TestStatus::Skipped => StepStatus::Skipped,
        TestStatus::Pending => StepStatus::Pending,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StepOutcome {
    status: TestStatus,
    duration_ms: u64,
    message: Option<String>,
    stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttemptPlan {
    attempt: u32,
    duration_ms: u64,
    steps: Vec<StepOutcome>,
    /// Outcome step result, when the steps alone understate the attempt.
    outcome: Option<StepOutcome>,
}

/// One plan per attempt sequence; the last one is the final attempt.
fn plan_attempts(case: &TestCaseResult) -> Vec<AttemptPlan> {
    let step_count = case.story.steps.len();
    let final_plan = |attempt| {
        reconciled(
            attempt,
            case.duration_ms,
            final_outcomes(case),
            case.status,
            case.error_message.as_deref(),
            case.error_stack.as_deref(),
        )
    };

    match case.attempts.as_deref() {
        Some([earlier @ .., last]) => {
            let mut plans: Vec<AttemptPlan> = earlier
                .iter()
                .map(|a| {
                    let steps = approximate_steps(
                        step_count,
                        a.status,
                        a.duration_ms,
                        a.error_message.as_deref(),
                        a.error_stack.as_deref(),
                    );
                    reconciled(
                        a.attempt,
                        a.duration_ms,
                        steps,
                        a.status,
                        a.error_message.as_deref(),
                        a.error_stack.as_deref(),
                    )
                })
                .collect();
            plans.push(final_plan(last.attempt));
            plans
        }
        _ => vec![final_plan(case.retry)],
    }
}

/// Make the worst step status equal the attempt status. Steps worse than
/// the attempt are capped at it; an attempt worse than every step gets an
/// outcome step carrying its status and error.
fn reconciled(
    attempt: u32,
    duration_ms: u64,
    mut steps: Vec<StepOutcome>,
    status: TestStatus,
    message: Option<&str>,
    stack: Option<&str>,
) -> AttemptPlan {
    for step in &mut steps {
        if step.status.severity() > status.severity() {
            step.status = status;
            step.message = None;
            step.stack = None;
        }
    }
    let worst = steps
        .iter()
        .map(|s| s.status)
        .max_by_key(TestStatus::severity)
        .unwrap_or(TestStatus::Passed);
    let outcome = (status.severity() > worst.severity()).then(|| StepOutcome {
        status,
        duration_ms: 0,
        message: message.map(str::to_string),
        stack: stack.map(str::to_string),
    });
    AttemptPlan {
        attempt,
        duration_ms,
        steps,
        outcome,
    }
}

/// Whether any attempt of `case` reports through the outcome step.
pub(crate) fn needs_outcome_step(case: &TestCaseResult) -> bool {
    plan_attempts(case).iter().any(|p| p.outcome.is_some())
}

/// The after-test-case hook referenced by outcome steps.
pub fn outcome_hook(ids: &MessageIds) -> Hook {
    Hook {
        id: ids.outcome_hook(),
        name: Some(OUTCOME_HOOK_NAME.to_string()),
        source_reference: SourceReference::default(),
        tag_expression: None,
        hook_type: Some(HookType::AfterTestCase),
    }
}

fn final_outcomes(case: &TestCaseResult) -> Vec<StepOutcome> {
    (0..case.story.steps.len())
        .map(|i| match case.step_results.iter().find(|r| r.index == i) {
            Some(r) => StepOutcome {
                status: r.status,
                duration_ms: r.duration_ms,
                message: r.error_message.clone(),
                stack: r.error_stack.clone(),
            },
            None => StepOutcome {
                status: TestStatus::Skipped,
                duration_ms: 0,
                message: None,
                stack: None,
            },
        })
        .collect()
}

/// Per-step outcomes of an earlier attempt, which only reports a total.
/// Duration is divided evenly across steps.
fn approximate_steps(
    step_count: usize,
    status: TestStatus,
    duration_ms: u64,
    message: Option<&str>,
    stack: Option<&str>,
) -> Vec<StepOutcome> {
    let per_step = if step_count == 0 {
        0
    } else {
        duration_ms / step_count as u64
    };
    (0..step_count)
        .map(|i| {
            let blamed = status == TestStatus::Failed && i + 1 == step_count;
            let status = match status {
                TestStatus::Failed if !blamed => TestStatus::Passed,
                other => other,
            };
            StepOutcome {
                status,
                duration_ms: per_step,
                message: blamed.then(|| message.map(str::to_string)).flatten(),
                stack: blamed.then(|| stack.map(str::to_string)).flatten(),
            }
        })
        .collect()
}

/// Builds the execution envelopes of every scenario against one clock.
pub struct ExecutionBuilder<'a> {
    ids: &'a MessageIds,
    test_run_started_id: &'a str,
    clock_ms: u64,
}

impl<'a> ExecutionBuilder<'a> {
    pub fn new(ids: &'a MessageIds, test_run_started_id: &'a str, started_at_ms: u64) -> Self {
        Self {
            ids,
            test_run_started_id,
            clock_ms: started_at_ms,
        }
    }

    /// Current position of the running clock.
    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// The `testCase` envelope shared by all attempts of a scenario.
    pub fn test_case(&self, scoped: &ScopedCase<'_>) -> TestCase {
        self.build_test_case(scoped, needs_outcome_step(scoped.case))
    }

    fn build_test_case(&self, scoped: &ScopedCase<'_>, with_outcome: bool) -> TestCase {
        let scope = &scoped.scope;
        let mut test_steps: Vec<TestStep> = (0..scoped.case.story.steps.len())
            .map(|i| TestStep {
                id: self.ids.test_step(scope, i),
                pickle_step_id: Some(self.ids.pickle_step(scope, i)),
                hook_id: None,
                step_definition_ids: Some(Vec::new()),
                step_match_arguments_lists: Some(Vec::new()),
            })
            .collect();
        if with_outcome {
            test_steps.push(TestStep {
                id: self.ids.outcome_step(scope),
                pickle_step_id: None,
                hook_id: Some(self.ids.outcome_hook()),
                step_definition_ids: None,
                step_match_arguments_lists: None,
            });
        }
        TestCase {
            id: self.ids.test_case(scope),
            pickle_id: self.ids.pickle(scope),
            test_steps,
            test_run_started_id: Some(self.test_run_started_id.to_string()),
        }
    }

    /// Append the test case and all of its attempt sequences to `out`.
    pub fn push_scenario(&mut self, scoped: &ScopedCase<'_>, out: &mut Vec<Envelope>) {
        let plans = plan_attempts(scoped.case);
        let with_outcome = plans.iter().any(|p| p.outcome.is_some());
        out.push(Envelope::TestCase(self.build_test_case(scoped, with_outcome)));
        let last = plans.len().saturating_sub(1);
        for (k, plan) in plans.iter().enumerate() {
            self.push_attempt(scoped, plan, k == last, with_outcome, out);
        }
    }

    fn push_step(
        &mut self,
        started_id: &str,
        step_id: &str,
        outcome: &StepOutcome,
        out: &mut Vec<Envelope>,
    ) {
        out.push(Envelope::TestStepStarted(TestStepStarted {
            test_case_started_id: started_id.to_string(),
            test_step_id: step_id.to_string(),
            timestamp: Timestamp::from_millis(self.clock_ms),
        }));
        self.clock_ms = self.clock_ms.saturating_add(outcome.duration_ms);
        out.push(Envelope::TestStepFinished(TestStepFinished {
            test_case_started_id: started_id.to_string(),
            test_step_id: step_id.to_string(),
            test_step_result: step_result(outcome),
            timestamp: Timestamp::from_millis(self.clock_ms),
        }));
    }

    fn push_attempt(
        &mut self,
        scoped: &ScopedCase<'_>,
        plan: &AttemptPlan,
        is_final: bool,
        with_outcome: bool,
        out: &mut Vec<Envelope>,
    ) {
        let case = scoped.case;
        let scope = &scoped.scope;
        let started_id = self.ids.test_case_started(scope, plan.attempt);
        let started_at = self.clock_ms;

        out.push(Envelope::TestCaseStarted(TestCaseStarted {
            attempt: plan.attempt,
            id: started_id.clone(),
            test_case_id: self.ids.test_case(scope),
            worker_id: None,
            timestamp: Timestamp::from_millis(started_at),
        }));

        let tie_index = plan
            .steps
            .iter()
            .position(|s| s.status == TestStatus::Failed)
            .or_else(|| plan.steps.len().checked_sub(1));

        for (i, outcome) in plan.steps.iter().enumerate() {
            let step_id = self.ids.test_step(scope, i);
            self.push_step(&started_id, &step_id, outcome, out);

            if !is_final {
                continue;
            }
            if let Some(step) = case.story.steps.get(i) {
                for doc in &step.docs {
                    if let DocEntry::Screenshot { path, .. } = doc {
                        out.push(Envelope::Attachment(screenshot_attachment(
                            path,
                            &started_id,
                            &step_id,
                        )));
                    }
                }
            }
            if tie_index == Some(i) {
                for att in &case.attachments {
                    out.push(Envelope::Attachment(case_attachment(
                        att,
                        &started_id,
                        Some(step_id.as_str()),
                    )));
                }
            }
        }

        if with_outcome {
            let passed = StepOutcome {
                status: TestStatus::Passed,
                duration_ms: 0,
                message: None,
                stack: None,
            };
            let outcome = plan.outcome.as_ref().unwrap_or(&passed);
            let step_id = self.ids.outcome_step(scope);
            self.push_step(&started_id, &step_id, outcome, out);
        }

        // No step to tie to: attach to the attempt itself.
        if is_final && plan.steps.is_empty() {
            for att in &case.attachments {
                out.push(Envelope::Attachment(case_attachment(att, &started_id, None)));
            }
        }

        let steps_total = plan
            .steps
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.duration_ms));
        let finished_at = started_at.saturating_add(plan.duration_ms.max(steps_total));
        self.clock_ms = self.clock_ms.max(finished_at);
        out.push(Envelope::TestCaseFinished(TestCaseFinished {
            test_case_started_id: started_id,
            timestamp: Timestamp::from_millis(finished_at),
            will_be_retried: !is_final,
        }));
    }
}

fn step_result(outcome: &StepOutcome) -> TestStepResult {
    let failed = outcome.status == TestStatus::Failed;
    let exception = (failed && (outcome.message.is_some() || outcome.stack.is_some())).then(|| {
        Exception {
            exception_type: EXCEPTION_TYPE.to_string(),
            message: outcome.message.clone(),
            stack_trace: outcome.stack.clone(),
        }
    });
    TestStepResult {
        duration: Duration::from_millis(outcome.duration_ms),
        message: if failed { outcome.message.clone() } else { None },
        status: step_status(outcome.status),
        exception,
    }
}

fn case_attachment(att: &CaseAttachment, started_id: &str, step_id: Option<&str>) -> Attachment {
    Attachment {
        body: att.body.clone(),
        content_encoding: att.content_encoding,
        file_name: Some(att.name.clone()),
        media_type: att.media_type.clone(),
        test_case_started_id: Some(started_id.to_string()),
        test_step_id: step_id.map(str::to_string),
        test_run_started_id: None,
        url: None,
    }
}

fn screenshot_attachment(path: &str, started_id: &str, step_id: &str) -> Attachment {
    let (body, content_encoding, media_type) = match parse_data_uri(path) {
        Some(data) => (data.base64_body, ContentEncoding::Base64, data.media_type),
        None => (
            path.to_string(),
            ContentEncoding::Identity,
            image_media_type(path).to_string(),
        ),
    };
    Attachment {
        body,
        content_encoding,
        file_name: None,
        media_type,
        test_case_started_id: Some(started_id.to_string()),
        test_step_id: Some(step_id.to_string()),
        test_run_started_id: None,
        url: None,
    }
}

/// Image media type from a path's extension, PNG when unknown.
pub fn image_media_type(path: &str) -> &'static str {
    guess_media_type(path)
        .filter(|m| m.starts_with("image/"))
        .unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE)
}

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: String,
    pub base64_body: String,
}

fn data_uri_regex() -> Option<&'static Regex> {
    static DATA_URI: OnceLock<Option<Regex>> = OnceLock::new();
    DATA_URI
        .get_or_init(|| Regex::new(r"(?s)^data:([^;,]*)((?:;[^;,]*)*),(.*)$").ok())
        .as_ref()
}

/// Parse a `data:` URI into a media type and a base64 body. Non-base64
/// payloads are percent-decoded and re-encoded.
pub fn parse_data_uri(uri: &str) -> Option<DataUri> {
    let caps = data_uri_regex()?.captures(uri)?;
    let declared = caps.get(1).map_or("", |m| m.as_str()).trim();
    let params = caps.get(2).map_or("", |m| m.as_str());
    let payload = caps.get(3).map_or("", |m| m.as_str());

    let is_base64 = params
        .split(';')
        .any(|p| p.trim().eq_ignore_ascii_case("base64"));
    let base64_body = if is_base64 {
        payload.to_string()
    } else {
        base64::engine::general_purpose::STANDARD.encode(percent_decode(payload))
    };
    let media_type = if declared.is_empty() {
        DEFAULT_IMAGE_MEDIA_TYPE.to_string()
    } else {
        declared.to_string()
    };
    Some(DataUri {
        media_type,
        base64_body,
    })
}

/// Build the `data:` URI for a base64 body.
pub fn data_uri(media_type: &str, base64_body: &str) -> String {
    format!("data:{media_type};base64,{base64_body}")
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = char::from(bytes[i + 1]).to_digit(16);
            let lo = char::from(bytes[i + 2]).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::scope_cases;
    use storyline_core::{
        StepKeyword, StepResult, StoryMeta, StoryStep, TestCaseAttempt, TestRunResult,
        SCHEMA_VERSION,
    };

    fn result(index: usize, status: TestStatus, duration_ms: u64) -> StepResult {
        StepResult {
            index,
            status,
            duration_ms,
            error_message: (status == TestStatus::Failed).then(|| "boom".to_string()),
            error_stack: (status == TestStatus::Failed).then(|| "at step".to_string()),
        }
    }

    fn case(status: TestStatus, results: Vec<StepResult>) -> TestCaseResult {
        let mut shot = StoryStep::new(StepKeyword::When, "the page renders");
        shot.docs = vec![DocEntry::screenshot("shots/page.jpg")];
        TestCaseResult {
            id: "c".into(),
            story: StoryMeta {
                scenario: "renders".into(),
                steps: vec![
                    StoryStep::new(StepKeyword::Given, "a page"),
                    shot,
                    StoryStep::new(StepKeyword::Then, "it looks right"),
                ],
                tags: vec![],
                tickets: vec![],
                docs: vec![],
                suite_path: None,
            },
            source_file: "page.test.ts".into(),
            source_line: 1,
            status,
            duration_ms: 100,
            error_message: None,
            error_stack: None,
            attachments: vec![CaseAttachment {
                name: "trace.zip".into(),
                media_type: "application/zip".into(),
                body: "UEsDBA==".into(),
                content_encoding: ContentEncoding::Base64,
                path: None,
                byte_length: None,
            }],
            step_results: results,
            tags: vec![],
            title_path: vec![],
            retry: 0,
            retries: 0,
            attempts: None,
            project_name: None,
        }
    }

    fn run_of(case: TestCaseResult) -> TestRunResult {
        TestRunResult {
            schema_version: SCHEMA_VERSION,
            run_id: "run".into(),
            project_root: ".".into(),
            started_at_ms: 1_000,
            finished_at_ms: 2_000,
            duration_ms: 1_000,
            test_cases: vec![case],
            package_version: None,
            git_sha: None,
            ci: None,
        }
    }

    fn kinds(envs: &[Envelope]) -> Vec<&'static str> {
        envs.iter().map(Envelope::kind).collect()
    }

    #[test]
    fn step_timestamps_accumulate() {
        let run = run_of(case(
            TestStatus::Passed,
            vec![
                result(0, TestStatus::Passed, 10),
                result(1, TestStatus::Passed, 20),
                result(2, TestStatus::Passed, 30),
            ],
        ));
        let scoped = scope_cases(&run);
        let ids = MessageIds::new("");
        let mut builder = ExecutionBuilder::new(&ids, "run", run.started_at_ms);
        let mut out = Vec::new();
        builder.push_scenario(&scoped[0], &mut out);

        let finishes: Vec<u64> = out
            .iter()
            .filter_map(|e| match e {
                Envelope::TestStepFinished(f) => Some(f.timestamp.to_millis()),
                _ => None,
            })
            .collect();
        assert_eq!(finishes, vec![1_010, 1_030, 1_060]);
        match out.last() {
            Some(Envelope::TestCaseFinished(f)) => {
                assert_eq!(f.timestamp.to_millis(), 1_100);
                assert!(!f.will_be_retried);
            }
            other => panic!("expected testCaseFinished, got {other:?}"),
        }
        assert_eq!(builder.clock_ms(), 1_100);
    }

    #[test]
    fn attachments_follow_their_steps() {
        let run = run_of(case(
            TestStatus::Failed,
            vec![
                result(0, TestStatus::Passed, 0),
                result(1, TestStatus::Failed, 0),
                result(2, TestStatus::Skipped, 0),
            ],
        ));
        let scoped = scope_cases(&run);
        let ids = MessageIds::new("");
        let mut out = Vec::new();
        ExecutionBuilder::new(&ids, "run", 0).push_scenario(&scoped[0], &mut out);

        assert_eq!(
            kinds(&out),
            vec![
                "testCase",
                "testCaseStarted",
                "testStepStarted",
                "testStepFinished",
                "testStepStarted",
                "testStepFinished",
                "attachment",
                "attachment",
                "testStepStarted",
                "testStepFinished",
                "testCaseFinished",
            ]
        );
        let Envelope::Attachment(shot) = &out[6] else {
            panic!("expected screenshot attachment");
        };
        assert_eq!(shot.content_encoding, ContentEncoding::Identity);
        assert_eq!(shot.media_type, "image/jpeg");
        assert_eq!(shot.file_name, None);
        let Envelope::Attachment(trace) = &out[7] else {
            panic!("expected case attachment");
        };
        assert_eq!(trace.file_name.as_deref(), Some("trace.zip"));
        assert_eq!(trace.test_step_id, Some(ids.test_step(&scoped[0].scope, 1)));

        let Envelope::TestStepFinished(failed) = &out[5] else {
            panic!("expected step finish");
        };
        let exception = failed.test_step_result.exception.as_ref().unwrap();
        assert_eq!(exception.stack_trace.as_deref(), Some("at step"));
        assert_eq!(failed.test_step_result.message.as_deref(), Some("boom"));
    }

    #[test]
    fn clock_saturates_on_huge_durations() {
        let mut c = case(
            TestStatus::Passed,
            vec![
                result(0, TestStatus::Passed, u64::MAX),
                result(1, TestStatus::Passed, u64::MAX),
                result(2, TestStatus::Passed, 1),
            ],
        );
        c.duration_ms = u64::MAX;
        let run = run_of(c);
        let scoped = scope_cases(&run);
        let ids = MessageIds::new("");
        let mut builder = ExecutionBuilder::new(&ids, "run", run.started_at_ms);
        let mut out = Vec::new();
        builder.push_scenario(&scoped[0], &mut out);
        assert_eq!(builder.clock_ms(), u64::MAX);
        match out.last() {
            Some(Envelope::TestCaseFinished(f)) => {
                assert_eq!(f.timestamp.to_millis(), u64::MAX)
            }
            other => panic!("expected testCaseFinished, got {other:?}"),
        }
    }

    #[test]
    fn earlier_attempts_are_approximated() {
        let mut c = case(
            TestStatus::Passed,
            vec![
                result(0, TestStatus::Passed, 1),
                result(1, TestStatus::Passed, 1),
                result(2, TestStatus::Passed, 1),
            ],
        );
        c.retry = 1;
        c.attempts = Some(vec![
            TestCaseAttempt {
                attempt: 0,
                status: TestStatus::Failed,
                duration_ms: 90,
                error_message: Some("flaky".into()),
                error_stack: None,
            },
            TestCaseAttempt {
                attempt: 1,
                status: TestStatus::Passed,
                duration_ms: 100,
                error_message: None,
                error_stack: None,
            },
        ]);
        let plans = plan_attempts(&c);
        assert_eq!(plans.len(), 2);
        let first: Vec<_> = plans[0].steps.iter().map(|s| (s.status, s.duration_ms)).collect();
        assert_eq!(
            first,
            vec![
                (TestStatus::Passed, 30),
                (TestStatus::Passed, 30),
                (TestStatus::Failed, 30)
            ]
        );
        assert_eq!(plans[0].steps[2].message.as_deref(), Some("flaky"));
        assert_eq!(plans[1].attempt, 1);

        let run = run_of(c);
        let scoped = scope_cases(&run);
        let ids = MessageIds::new("");
        let mut out = Vec::new();
        ExecutionBuilder::new(&ids, "run", 0).push_scenario(&scoped[0], &mut out);
        let retried: Vec<bool> = out
            .iter()
            .filter_map(|e| match e {
                Envelope::TestCaseFinished(f) => Some(f.will_be_retried),
                _ => None,
            })
            .collect();
        assert_eq!(retried, vec![true, false]);
        // Attachments only on the final attempt.
        assert_eq!(kinds(&out).iter().filter(|k| **k == "attachment").count(), 2);
    }

    #[test]
    fn failure_outside_any_step_reports_through_the_outcome_step() {
        let mut c = case(
            TestStatus::Failed,
            vec![
                result(0, TestStatus::Passed, 1),
                result(1, TestStatus::Passed, 1),
                result(2, TestStatus::Passed, 1),
            ],
        );
        c.error_message = Some("afterEach hook failed".into());
        let plans = plan_attempts(&c);
        let outcome = plans[0].outcome.as_ref().unwrap();
        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.message.as_deref(), Some("afterEach hook failed"));
        assert!(plans[0].steps.iter().all(|s| s.status == TestStatus::Passed));

        let run = run_of(c);
        let scoped = scope_cases(&run);
        let ids = MessageIds::new("");
        let mut out = Vec::new();
        ExecutionBuilder::new(&ids, "run", 0).push_scenario(&scoped[0], &mut out);

        let Envelope::TestCase(tc) = &out[0] else {
            panic!("expected testCase");
        };
        let outcome_step = tc.test_steps.last().unwrap();
        assert_eq!(outcome_step.id, ids.outcome_step(&scoped[0].scope));
        assert_eq!(outcome_step.hook_id, Some(ids.outcome_hook()));
        assert_eq!(outcome_step.pickle_step_id, None);

        let finished: Vec<_> = out
            .iter()
            .filter_map(|e| match e {
                Envelope::TestStepFinished(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(finished.len(), 4);
        let last = finished[3];
        assert_eq!(last.test_step_id, outcome_step.id);
        assert_eq!(last.test_step_result.status, StepStatus::Failed);
        assert_eq!(
            last.test_step_result.message.as_deref(),
            Some("afterEach hook failed")
        );
    }

    #[test]
    fn steps_never_outrank_their_attempt() {
        let plan = reconciled(
            0,
            10,
            vec![StepOutcome {
                status: TestStatus::Failed,
                duration_ms: 10,
                message: Some("boom".into()),
                stack: None,
            }],
            TestStatus::Pending,
            None,
            None,
        );
        assert_eq!(plan.steps[0].status, TestStatus::Pending);
        assert_eq!(plan.steps[0].message, None);
        assert!(plan.outcome.is_none());
    }

    #[test]
    fn stepless_attempts_carry_their_status() {
        let skipped = reconciled(0, 0, Vec::new(), TestStatus::Skipped, None, None);
        assert_eq!(skipped.outcome.map(|o| o.status), Some(TestStatus::Skipped));
        let passed = reconciled(0, 0, Vec::new(), TestStatus::Passed, None, None);
        assert!(passed.outcome.is_none());
    }

    #[test]
    fn skipped_attempt_keeps_its_status_on_every_step() {
        let steps = approximate_steps(2, TestStatus::Skipped, 7, None, None);
        assert!(steps.iter().all(|s| s.status == TestStatus::Skipped));
        assert_eq!(steps[0].duration_ms, 3);
        assert!(approximate_steps(0, TestStatus::Failed, 7, None, None).is_empty());
    }

    #[test]
    fn data_uris_decode_to_base64() {
        let parsed = parse_data_uri("data:image/gif;base64,R0lGOD==").unwrap();
        assert_eq!(parsed.media_type, "image/gif");
        assert_eq!(parsed.base64_body, "R0lGOD==");

        let plain = parse_data_uri("data:,a%20b").unwrap();
        assert_eq!(plain.media_type, DEFAULT_IMAGE_MEDIA_TYPE);
        assert_eq!(plain.base64_body, "YSBi");

        assert!(parse_data_uri("shots/a.png").is_none());
        assert_eq!(
            data_uri("image/png", "AAAA"),
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn screenshot_media_types_fall_back_to_png() {
        assert_eq!(image_media_type("a.webp"), "image/webp");
        assert_eq!(image_media_type("a.svg"), "image/svg+xml");
        assert_eq!(image_media_type("a.txt"), "image/png");
        assert_eq!(image_media_type("https://cdn.test/shot"), "image/png");
    }
}
