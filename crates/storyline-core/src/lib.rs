//! Storyline Core
//!
//! Turns permissive, partially-populated test-run data harvested from any
//! framework into a strict canonical model:
//! - `RawRun`: best-effort input produced by framework adapters
//! - `TestRunResult`: fully-populated canonical run with deterministic ids
//! - `DocEntry`: typed documentation attached to scenarios and steps
//!
//! The pipeline is a pure batch transformation. The only side effects are
//! attachment file reads and copies, isolated behind [`AttachmentFs`].

pub mod attachment;
pub mod canonicalize;
pub mod docs;
pub mod error;
pub mod ids;
pub mod model;
pub mod obs;
pub mod status;
pub mod steps;
pub mod telemetry;
pub mod validate;

pub use attachment::fs::{MemoryFs, StdFs};
pub use attachment::{
    collision_free_name, guess_media_type, AttachmentFs, AttachmentOptions, AttachmentResolver,
    DEFAULT_MAX_EMBED_BYTES,
};
pub use canonicalize::{
    canonicalize, canonicalize_with_fs, derive_title_path, normalize_tags, CanonicalizeOptions,
};
pub use docs::{DocEntry, DocPhase};
pub use error::{Result, RunViolation, StorylineError};
pub use ids::{generate_id, IdGenerator, IdKind};
pub use model::{
    Attachment, CiInfo, ContentEncoding, GitInfo, RawAttachment, RawAttempt, RawError, RawRun,
    RawStep, RawStepEvent, RawStory, RawTestCase, StepKeyword, StepResult, StoryMeta, StoryStep,
    TestCaseAttempt, TestCaseResult, TestRunResult, TestStatus, SCHEMA_VERSION,
};
pub use obs::RunSpan;
pub use status::normalize_status;
pub use steps::{derive_step_results, find_failing_step, merge_step_events};
pub use telemetry::init_tracing;
pub use validate::{assert_valid_run, validate_canonical_run};

/// Storyline version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
