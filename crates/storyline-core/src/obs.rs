//! Structured observability hooks for canonicalization and the message codec.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for key pipeline events: run canonicalized, case
//!   dropped, attachment resolved, stream encoded, stream decoded
//!
//! Events carry an `event = "..."` field so log pipelines can filter on it.

use tracing::{debug, info};

/// RAII guard that enters a run-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("3f2a9c01d4e5b6a7");
/// // everything logged now carries run_id = 3f2a9c01d4e5b6a7
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("storyline.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a raw run was turned into a canonical run.
pub fn emit_run_canonicalized(run_id: &str, test_cases: usize, dropped: usize) {
    info!(
        event = "run.canonicalized",
        run_id = %run_id,
        test_cases = test_cases,
        dropped = dropped,
    );
}

/// Emit event: a raw case was dropped because it carries no story.
pub fn emit_case_dropped(title: &str, source_file: &str) {
    debug!(event = "case.dropped", title = %title, source_file = %source_file);
}

/// Emit event: an attachment was resolved (`embedded`, `copied`, `linked`,
/// `missing`).
pub fn emit_attachment_resolved(name: &str, mode: &str) {
    debug!(event = "attachment.resolved", name = %name, mode = %mode);
}

/// Emit event: a canonical run was encoded into an envelope stream.
pub fn emit_stream_encoded(run_id: &str, envelopes: usize, success: bool) {
    info!(
        event = "messages.encoded",
        run_id = %run_id,
        envelopes = envelopes,
        success = success,
    );
}

/// Emit event: an envelope stream was decoded back into a canonical run.
pub fn emit_stream_decoded(run_id: &str, envelopes: usize, test_cases: usize) {
    info!(
        event = "messages.decoded",
        run_id = %run_id,
        envelopes = envelopes,
        test_cases = test_cases,
    );
}
