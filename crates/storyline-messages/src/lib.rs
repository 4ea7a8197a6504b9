//! Storyline Messages
//!
//! Encodes a canonical [`TestRunResult`](storyline_core::TestRunResult) into
//! a Cucumber Messages envelope stream and decodes such streams back:
//! - `format_envelopes` / `to_ndjson` / `write_ndjson`: canonical run to an
//!   ordered stream that never references an id before defining it
//! - `parse_ndjson` / `decode_envelopes`: any-order stream back to a
//!   canonical run, including retry attempts and step documentation
//!
//! When the originating framework has no feature files, a feature document
//! is synthesized per source file so every node can cite a line.

pub mod envelope;
pub mod error;
pub mod execution;
pub mod formatter;
pub mod gherkin;
pub mod parser;
pub mod scope;
pub mod step_args;
pub mod synth;

pub use envelope::{forward_references, Envelope, ForwardReference, PROTOCOL_VERSION};
pub use error::{MessagesError, Result};
pub use execution::{parse_data_uri, ExecutionBuilder};
pub use formatter::{
    envelopes_to_ndjson, format_envelopes, to_ndjson, write_ndjson, MessagesOptions,
};
pub use gherkin::{build_gherkin_document, build_pickle};
pub use parser::{decode_envelopes, decode_ndjson, parse_ndjson, DecodeOptions};
pub use scope::{group_by_source, scope_cases, MessageIds};
pub use step_args::{keyword_types, step_argument, StepArgument};
pub use synth::{synthesize_feature, ScenarioLines, SynthesizedFeature};
