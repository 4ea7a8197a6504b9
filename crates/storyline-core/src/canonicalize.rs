//! Anti-corruption layer: [`RawRun`] → [`TestRunResult`].
//!
//! The canonicalizer is the one place where permissive framework data is
//! turned into the strict model. It normalizes statuses, derives per-step
//! results, resolves attachments, normalizes tags and title paths, and
//! assigns deterministic identifiers.
//!
//! Raw cases without story metadata are dropped. This is intentional and the
//! only filtering rule in the pipeline: a case with no narrative has no steps
//! to report and cannot be represented canonically.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::attachment::fs::StdFs;
use crate::attachment::{AttachmentFs, AttachmentOptions, AttachmentResolver};
use crate::docs::DocEntry;
use crate::ids::{IdGenerator, IdKind};
use crate::model::{
    CiInfo, RawAttempt, RawRun, RawStory, RawTestCase, StepKeyword, StoryMeta, StoryStep,
    TestCaseAttempt, TestCaseResult, TestRunResult, TestStatus, SCHEMA_VERSION,
};
use crate::obs::{self, RunSpan};
use crate::status::normalize_status;
use crate::steps::{derive_step_results, merge_step_events};

/// Source file recorded for cases whose adapter did not report one.
pub const UNKNOWN_SOURCE_FILE: &str = "unknown";

/// Canonicalization knobs. Everything has a usable default.
#[derive(Debug, Clone, Default)]
pub struct CanonicalizeOptions {
    pub attachments: AttachmentOptions,
    /// Used when the raw run carries no start timestamp.
    pub default_started_at_ms: Option<u64>,
    /// Used when the raw run carries no finish timestamp.
    pub default_finished_at_ms: Option<u64>,
    /// Salt mixed into every generated identifier.
    pub id_salt: String,
    /// CI metadata resolved by the caller; the raw run's own value wins.
    pub ci: Option<CiInfo>,
}

impl CanonicalizeOptions {
    pub fn with_attachments(mut self, attachments: AttachmentOptions) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_default_timestamps(mut self, started_at_ms: u64, finished_at_ms: u64) -> Self {
        self.default_started_at_ms = Some(started_at_ms);
        self.default_finished_at_ms = Some(finished_at_ms);
        self
    }

    pub fn with_id_salt(mut self, salt: impl Into<String>) -> Self {
        self.id_salt = salt.into();
        self
    }

    pub fn with_ci(mut self, ci: CiInfo) -> Self {
        self.ci = Some(ci);
        self
    }
}

/// Canonicalize a raw run, reading attachment files from local disk.
pub fn canonicalize(raw: &RawRun, options: &CanonicalizeOptions) -> TestRunResult {
    canonicalize_with_fs(raw, options, &StdFs)
}

/// Canonicalize a raw run using the given filesystem capability.
pub fn canonicalize_with_fs(
    raw: &RawRun,
    options: &CanonicalizeOptions,
    fs: &dyn AttachmentFs,
) -> TestRunResult {
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    let started_at_ms = raw
        .started_at_ms
        .or(options.default_started_at_ms)
        .unwrap_or(now_ms);
    let finished_at_ms = raw
        .finished_at_ms
        .or(options.default_finished_at_ms)
        .unwrap_or(now_ms);

    let ids = IdGenerator::new(options.id_salt.clone());
    let run_id = ids.id(
        IdKind::Run,
        &[started_at_ms.to_string().as_str(), raw.project_root.as_str()],
    );
    let _span = RunSpan::enter(&run_id);

    let resolver =
        AttachmentResolver::new(fs, raw.project_root.as_str(), options.attachments.clone());

    let mut dropped = 0usize;
    let test_cases: Vec<TestCaseResult> = raw
        .test_cases
        .iter()
        .filter_map(|case| match &case.story {
            Some(story) => Some(canonicalize_case(case, story, &ids, &resolver)),
            None => {
                dropped += 1;
                obs::emit_case_dropped(
                    case.title.as_deref().unwrap_or("<untitled>"),
                    case.source_file.as_deref().unwrap_or(UNKNOWN_SOURCE_FILE),
                );
                None
            }
        })
        .collect();

    obs::emit_run_canonicalized(&run_id, test_cases.len(), dropped);

    TestRunResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        project_root: raw.project_root.clone(),
        started_at_ms,
        finished_at_ms,
        duration_ms: finished_at_ms.saturating_sub(started_at_ms),
        test_cases,
        package_version: raw.package_version.clone(),
        git_sha: raw.git_sha.clone(),
        ci: raw.ci.clone().or_else(|| options.ci.clone()),
    }
}

/// Outcome of the attempt that determines the reported result.
struct FinalOutcome {
    status: TestStatus,
    duration_ms: u64,
    error_message: Option<String>,
    error_stack: Option<String>,
}

fn canonicalize_case(
    raw: &RawTestCase,
    story: &RawStory,
    ids: &IdGenerator,
    resolver: &AttachmentResolver<'_>,
) -> TestCaseResult {
    let source_file = raw
        .source_file
        .clone()
        .unwrap_or_else(|| UNKNOWN_SOURCE_FILE.to_string());
    let id = ids.id(
        IdKind::TestCase,
        &[source_file.as_str(), story.scenario.as_str()],
    );

    let steps: Vec<StoryStep> = story
        .steps
        .iter()
        .map(|step| StoryStep {
            keyword: StepKeyword::parse(&step.keyword),
            text: step.text.clone(),
            docs: step.docs.clone(),
            duration_ms: step.duration_ms,
        })
        .collect();

    let attempts = canonical_attempts(&raw.attempts);
    let outcome = match attempts.last() {
        Some(last) if attempts.len() > 1 => FinalOutcome {
            status: last.status,
            duration_ms: last.duration_ms,
            error_message: last.error_message.clone(),
            error_stack: last.error_stack.clone(),
        },
        _ => FinalOutcome {
            status: normalize_status(
                raw.status
                    .as_deref()
                    .or_else(|| raw.attempts.first().and_then(|a| a.status.as_deref())),
            ),
            duration_ms: raw.duration_ms.unwrap_or(0),
            error_message: raw.error.as_ref().and_then(|e| e.message.clone()),
            error_stack: raw.error.as_ref().and_then(|e| e.stack.clone()),
        },
    };

    let step_results = merge_step_events(
        derive_step_results(
            &steps,
            outcome.status,
            outcome.error_message.as_deref(),
            outcome.error_stack.as_deref(),
        ),
        &raw.step_events,
    );

    let tag_docs = story.docs.iter().filter_map(|doc| match doc {
        DocEntry::Tag { names, .. } => Some(names.iter()),
        _ => None,
    });
    let tags = normalize_tags(
        story
            .tags
            .iter()
            .chain(raw.tags.iter())
            .chain(tag_docs.flatten()),
    );

    let (retry, attempts) = if attempts.len() > 1 {
        ((attempts.len() - 1) as u32, Some(attempts))
    } else {
        (raw.retry.unwrap_or(0), None)
    };
    let retries = raw.retries.unwrap_or(0).max(retry);

    let title_path = derive_title_path(
        story.suite_path.as_deref(),
        raw.title_path.as_deref(),
        &story.scenario,
    );

    TestCaseResult {
        id,
        story: StoryMeta {
            scenario: story.scenario.clone(),
            steps,
            tags: tags.clone(),
            tickets: story.tickets.clone(),
            docs: story.docs.clone(),
            suite_path: story.suite_path.clone(),
        },
        source_file,
        source_line: raw.source_line.unwrap_or(1).max(1),
        status: outcome.status,
        duration_ms: outcome.duration_ms,
        error_message: outcome.error_message,
        error_stack: outcome.error_stack,
        attachments: raw.attachments.iter().map(|a| resolver.resolve(a)).collect(),
        step_results,
        tags,
        title_path,
        retry,
        retries,
        attempts,
        project_name: raw.project_name.clone(),
    }
}

/// Order raw attempts by attempt number (position when absent) and renumber
/// them densely from 0.
fn canonical_attempts(raw: &[RawAttempt]) -> Vec<TestCaseAttempt> {
    let mut ordered: Vec<(u32, &RawAttempt)> = raw
        .iter()
        .enumerate()
        .map(|(pos, a)| (a.attempt.unwrap_or(pos as u32), a))
        .collect();
    ordered.sort_by_key(|(n, _)| *n);
    ordered
        .into_iter()
        .enumerate()
        .map(|(n, (_, a))| TestCaseAttempt {
            attempt: n as u32,
            status: normalize_status(a.status.as_deref()),
            duration_ms: a.duration_ms.unwrap_or(0),
            error_message: a.error.as_ref().and_then(|e| e.message.clone()),
            error_stack: a.error.as_ref().and_then(|e| e.stack.clone()),
        })
        .collect()
}

/// Trim, strip a leading `@`, drop empties, dedupe and sort.
pub fn normalize_tags<'a, I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('@').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Title path of a case, excluding the scenario itself.
///
/// An explicit, non-empty suite path wins. Otherwise the framework's full
/// title path is used, minus a trailing element that repeats the scenario
/// name.
pub fn derive_title_path(
    suite_path: Option<&[String]>,
    title_path: Option<&[String]>,
    scenario: &str,
) -> Vec<String> {
    if let Some(suite) = suite_path.filter(|s| !s.is_empty()) {
        return suite.to_vec();
    }
    let Some(full) = title_path else {
        return Vec::new();
    };
    match full.split_last() {
        Some((last, rest)) if last.trim() == scenario.trim() => rest.to_vec(),
        _ => full.to_vec(),
    }
}
