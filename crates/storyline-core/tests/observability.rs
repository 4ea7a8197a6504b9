//! Observability tests: the pipeline's structured events are emitted and
//! reach the subscriber.

use storyline_core::obs::{
    emit_attachment_resolved, emit_case_dropped, emit_run_canonicalized, emit_stream_decoded,
    emit_stream_encoded,
};
use storyline_core::{
    canonicalize_with_fs, CanonicalizeOptions, MemoryFs, RawRun, RawStory, RawTestCase, RunSpan,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emitters_do_not_panic() {
    emit_run_canonicalized("run-1", 3, 1);
    emit_case_dropped("plain test", "a.test.ts");
    emit_attachment_resolved("shot.png", "embedded");
    emit_stream_encoded("run-1", 42, true);
    emit_stream_decoded("run-1", 42, 3);
}

#[traced_test]
#[test]
fn test_run_span_enter_creates_span() {
    let span = RunSpan::enter("span-run");
    drop(span);
}

#[traced_test]
#[test]
fn test_canonicalize_logs_run_canonicalized() {
    let raw = RawRun {
        project_root: "/repo".into(),
        started_at_ms: Some(1),
        finished_at_ms: Some(2),
        test_cases: vec![
            RawTestCase {
                story: Some(RawStory {
                    scenario: "logged".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            RawTestCase::default(),
        ],
        ..Default::default()
    };
    let run = canonicalize_with_fs(&raw, &CanonicalizeOptions::default(), &MemoryFs::new());
    assert_eq!(run.test_cases.len(), 1);
    assert!(logs_contain("run.canonicalized"));
    assert!(logs_contain("dropped=1"));
}
