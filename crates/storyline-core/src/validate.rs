//! Structural validation of canonical runs.
//!
//! Canonicalization tolerates messy input; this module is the boundary that
//! refuses provably inconsistent output. [`validate_canonical_run`] returns
//! every violation found; [`assert_valid_run`] turns a non-empty list into
//! [`StorylineError::InvalidRun`].

use std::collections::BTreeSet;

use crate::error::{Result, RunViolation, StorylineError};
use crate::model::{TestCaseResult, TestRunResult};

/// Collect all structural violations in `run`.
///
/// Checks:
/// 1. Run id and project root are present; `durationMs` matches the timestamps.
/// 2. Every case has an id, scenario name, source file and `sourceLine >= 1`.
/// 3. `stepResults` has one entry per story step, with indices exactly
///    `0..n` and no duplicates.
/// 4. Tags are sorted and deduplicated.
/// 5. `attempts`, when present, has more than one entry numbered from 0 and
///    its final entry agrees with the case status.
pub fn validate_canonical_run(run: &TestRunResult) -> Vec<RunViolation> {
    let mut violations = Vec::new();

    if run.run_id.trim().is_empty() {
        violations.push(RunViolation::new("runId", "must not be empty"));
    }
    if run.project_root.trim().is_empty() {
        violations.push(RunViolation::new("projectRoot", "must not be empty"));
    }
    let expected = run.finished_at_ms.saturating_sub(run.started_at_ms);
    if run.duration_ms != expected {
        violations.push(RunViolation::new(
            "durationMs",
            format!(
                "is {} but finishedAtMs - startedAtMs is {}",
                run.duration_ms, expected
            ),
        ));
    }

    for (i, case) in run.test_cases.iter().enumerate() {
        validate_case(&format!("testCases[{i}]"), case, &mut violations);
    }
    violations
}

fn validate_case(prefix: &str, case: &TestCaseResult, out: &mut Vec<RunViolation>) {
    let mut push = |field: &str, message: String| {
        out.push(RunViolation::new(format!("{prefix}.{field}"), message));
    };

    if case.id.trim().is_empty() {
        push("id", "must not be empty".into());
    }
    if case.story.scenario.trim().is_empty() {
        push("story.scenario", "must not be empty".into());
    }
    if case.source_file.trim().is_empty() {
        push("sourceFile", "must not be empty".into());
    }
    if case.source_line < 1 {
        push("sourceLine", "must be >= 1".into());
    }

    let step_count = case.story.steps.len();
    if case.step_results.len() != step_count {
        push(
            "stepResults",
            format!(
                "has {} entries but story has {} steps",
                case.step_results.len(),
                step_count
            ),
        );
    }
    let mut seen = BTreeSet::new();
    for (j, result) in case.step_results.iter().enumerate() {
        if result.index >= step_count {
            push(
                &format!("stepResults[{j}].index"),
                format!("{} is out of range 0..{}", result.index, step_count),
            );
        } else if !seen.insert(result.index) {
            push(
                &format!("stepResults[{j}].index"),
                format!("{} is duplicated", result.index),
            );
        }
    }

    if case.tags.windows(2).any(|w| w[0] >= w[1]) {
        push("tags", "must be sorted and deduplicated".into());
    }

    if let Some(attempts) = &case.attempts {
        if attempts.len() < 2 {
            push("attempts", "must be absent unless more than one attempt ran".into());
        }
        for (k, attempt) in attempts.iter().enumerate() {
            if attempt.attempt as usize != k {
                push(
                    &format!("attempts[{k}].attempt"),
                    format!("is {} but expected {}", attempt.attempt, k),
                );
            }
        }
        if let Some(last) = attempts.last() {
            if last.status != case.status {
                push(
                    "status",
                    format!(
                        "is {} but the final attempt is {}",
                        case.status, last.status
                    ),
                );
            }
        }
    }
}

/// Fail with every violation concatenated when `run` is inconsistent.
pub fn assert_valid_run(run: &TestRunResult) -> Result<()> {
    let violations = validate_canonical_run(run);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(StorylineError::InvalidRun { violations })
    }
}
