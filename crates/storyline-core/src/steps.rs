//! Per-step result derivation.
//!
//! Most frameworks only report a scenario-level outcome. [`derive_step_results`]
//! expands that into one [`StepResult`] per step, using a text-matching
//! heuristic to decide which step a failure belongs to.
//! [`merge_step_events`] then overlays whatever partial per-step data the
//! framework did provide.

use crate::model::{RawStepEvent, StepResult, StoryStep, TestStatus};
use crate::status::normalize_status;

/// Locate the step a failure should be attributed to.
///
/// Scans steps in order and returns the first whose literal text occurs,
/// case-insensitively, in `message + stack`. Falls back to the last step.
/// Returns `None` only when there are no steps.
pub fn find_failing_step(
    steps: &[StoryStep],
    error_message: Option<&str>,
    error_stack: Option<&str>,
) -> Option<usize> {
    if steps.is_empty() {
        return None;
    }
    let haystack = format!(
        "{}\n{}",
        error_message.unwrap_or_default(),
        error_stack.unwrap_or_default()
    )
    .to_lowercase();

    let matched = steps.iter().position(|step| {
        let needle = step.text.trim().to_lowercase();
        !needle.is_empty() && haystack.contains(&needle)
    });
    Some(matched.unwrap_or(steps.len() - 1))
}

/// Derive one result per step from the scenario-level outcome.
///
/// - `passed`: every step passed.
/// - `skipped` / `pending`: every step takes that status.
/// - `failed`: steps before the blamed step passed, the blamed step failed
///   (carrying the error), later steps were skipped.
///
/// Durations come from the story step when known, otherwise 0.
pub fn derive_step_results(
    steps: &[StoryStep],
    status: TestStatus,
    error_message: Option<&str>,
    error_stack: Option<&str>,
) -> Vec<StepResult> {
    let blamed = match status {
        TestStatus::Failed => find_failing_step(steps, error_message, error_stack),
        _ => None,
    };

    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let duration_ms = step.duration_ms.unwrap_or(0);
            let step_status = match (status, blamed) {
                (TestStatus::Failed, Some(b)) if index < b => TestStatus::Passed,
                (TestStatus::Failed, Some(b)) if index == b => TestStatus::Failed,
                (TestStatus::Failed, _) => TestStatus::Skipped,
                (other, _) => other,
            };
            let failed_here = step_status == TestStatus::Failed;
            StepResult {
                index,
                status: step_status,
                duration_ms,
                error_message: failed_here
                    .then(|| error_message.map(str::to_string))
                    .flatten(),
                error_stack: failed_here
                    .then(|| error_stack.map(str::to_string))
                    .flatten(),
            }
        })
        .collect()
}

/// Overlay framework-supplied step events onto derived results.
///
/// Events are matched by `index` (or by their position when no index is
/// given). Framework values win field-by-field; indices the framework did
/// not mention keep their derived values. Out-of-range events are ignored.
pub fn merge_step_events(mut derived: Vec<StepResult>, events: &[RawStepEvent]) -> Vec<StepResult> {
    for (position, event) in events.iter().enumerate() {
        let index = event.index.unwrap_or(position);
        let Some(result) = derived.get_mut(index) else {
            tracing::debug!(index, steps = derived.len(), "ignoring out-of-range step event");
            continue;
        };
        if let Some(status) = event.status.as_deref() {
            result.status = normalize_status(Some(status));
        }
        if let Some(duration_ms) = event.duration_ms {
            result.duration_ms = duration_ms;
        }
        if let Some(message) = &event.error_message {
            result.error_message = Some(message.clone());
        }
        if let Some(stack) = &event.error_stack {
            result.error_stack = Some(stack.clone());
        }
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepKeyword;

    fn steps() -> Vec<StoryStep> {
        vec![
            StoryStep::new(StepKeyword::Given, "a registered user"),
            StoryStep::new(StepKeyword::When, "they submit the login form"),
            StoryStep::new(StepKeyword::Then, "the dashboard is shown"),
        ]
    }

    fn statuses(results: &[StepResult]) -> Vec<TestStatus> {
        results.iter().map(|r| r.status).collect()
    }

    #[test]
    fn passed_scenario_passes_every_step() {
        let results = derive_step_results(&steps(), TestStatus::Passed, None, None);
        assert_eq!(statuses(&results), vec![TestStatus::Passed; 3]);
        assert_eq!(
            results.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn skipped_and_pending_propagate() {
        let skipped = derive_step_results(&steps(), TestStatus::Skipped, None, None);
        assert_eq!(statuses(&skipped), vec![TestStatus::Skipped; 3]);
        let pending = derive_step_results(&steps(), TestStatus::Pending, None, None);
        assert_eq!(statuses(&pending), vec![TestStatus::Pending; 3]);
    }

    #[test]
    fn failure_matching_second_step_text() {
        let results = derive_step_results(
            &steps(),
            TestStatus::Failed,
            Some("Step failed: They Submit The Login Form"),
            None,
        );
        assert_eq!(
            statuses(&results),
            vec![TestStatus::Passed, TestStatus::Failed, TestStatus::Skipped]
        );
        assert_eq!(
            results[1].error_message.as_deref(),
            Some("Step failed: They Submit The Login Form")
        );
        assert!(results[0].error_message.is_none());
        assert!(results[2].error_message.is_none());
    }

    #[test]
    fn failure_matched_in_stack_only() {
        let results = derive_step_results(
            &steps(),
            TestStatus::Failed,
            Some("expected true"),
            Some("at step 'a registered user' (login.test.ts:4)"),
        );
        assert_eq!(
            statuses(&results),
            vec![TestStatus::Failed, TestStatus::Skipped, TestStatus::Skipped]
        );
        assert!(results[0].error_stack.is_some());
    }

    #[test]
    fn unmatched_failure_blames_last_step() {
        let results =
            derive_step_results(&steps(), TestStatus::Failed, Some("boom"), None);
        assert_eq!(
            statuses(&results),
            vec![TestStatus::Passed, TestStatus::Passed, TestStatus::Failed]
        );
        assert_eq!(results[2].error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn first_match_wins() {
        let steps = vec![
            StoryStep::new(StepKeyword::Given, "x"),
            StoryStep::new(StepKeyword::Then, "x"),
        ];
        assert_eq!(find_failing_step(&steps, Some("x failed"), None), Some(0));
    }

    #[test]
    fn no_steps_yields_no_results() {
        assert!(derive_step_results(&[], TestStatus::Failed, Some("x"), None).is_empty());
        assert_eq!(find_failing_step(&[], Some("x"), None), None);
    }

    #[test]
    fn step_duration_is_carried_when_known() {
        let mut s = steps();
        s[0].duration_ms = Some(40);
        let results = derive_step_results(&s, TestStatus::Passed, None, None);
        assert_eq!(results[0].duration_ms, 40);
        assert_eq!(results[1].duration_ms, 0);
    }

    #[test]
    fn merge_prefers_framework_fields_by_index() {
        let derived = derive_step_results(&steps(), TestStatus::Passed, None, None);
        let events = vec![
            RawStepEvent {
                index: Some(2),
                status: Some("fail".into()),
                duration_ms: Some(12),
                error_message: Some("late".into()),
                error_stack: None,
            },
            RawStepEvent {
                index: Some(0),
                duration_ms: Some(5),
                ..Default::default()
            },
        ];
        let merged = merge_step_events(derived, &events);
        assert_eq!(merged[0].status, TestStatus::Passed);
        assert_eq!(merged[0].duration_ms, 5);
        assert_eq!(merged[1].duration_ms, 0);
        assert_eq!(merged[2].status, TestStatus::Failed);
        assert_eq!(merged[2].duration_ms, 12);
        assert_eq!(merged[2].error_message.as_deref(), Some("late"));
    }

    #[test]
    fn merge_uses_position_without_index_and_ignores_out_of_range() {
        let derived = derive_step_results(&steps(), TestStatus::Passed, None, None);
        let events = vec![
            RawStepEvent {
                duration_ms: Some(7),
                ..Default::default()
            },
            RawStepEvent {
                index: Some(9),
                status: Some("fail".into()),
                ..Default::default()
            },
        ];
        let merged = merge_step_events(derived, &events);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].duration_ms, 7);
        assert!(merged.iter().all(|r| r.status == TestStatus::Passed));
    }
}
