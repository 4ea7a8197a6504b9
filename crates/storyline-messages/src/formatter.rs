//! Envelope stream assembly.
//!
//! Stream order is fixed:
//! 1. `meta`
//! 2. per source file (first-appearance order): `source`, `gherkinDocument`
//!    (only with synthetics enabled)
//! 3. every `pickle`, for every file
//! 4. the outcome `hook`, when some scenario reports through it
//! 5. `testRunStarted`
//! 6. per scenario: `testCase` and its attempt sequences
//! 7. `testRunFinished`
//!
//! No envelope references an id that a later envelope defines.

use std::path::Path;

use anyhow::Context;
use storyline_core::{obs, TestRunResult};

use crate::envelope::{
    Envelope, Meta, Product, Source, TestRunFinished, TestRunStarted, Timestamp, PROTOCOL_VERSION,
};
use crate::error::Result;
use crate::execution::{needs_outcome_step, outcome_hook, ExecutionBuilder};
use crate::gherkin::{build_gherkin_document, build_pickle};
use crate::scope::{group_by_source, scope_cases, MessageIds};
use crate::synth::{synthesize_feature, SynthesizedFeature, GHERKIN_MEDIA_TYPE};

/// Encoder configuration.
#[derive(Debug, Clone)]
pub struct MessagesOptions {
    /// Emit synthesized `source` and `gherkinDocument` envelopes.
    pub include_synthetics: bool,
    pub id_salt: String,
    pub tool_name: String,
    pub tool_version: String,
}

impl Default for MessagesOptions {
    fn default() -> Self {
        Self {
            include_synthetics: true,
            id_salt: String::new(),
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl MessagesOptions {
    pub fn with_synthetics(mut self, include: bool) -> Self {
        self.include_synthetics = include;
        self
    }

    pub fn with_id_salt(mut self, salt: impl Into<String>) -> Self {
        self.id_salt = salt.into();
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self.tool_version = version.into();
        self
    }
}

fn meta(run: &TestRunResult, options: &MessagesOptions) -> Meta {
    Meta {
        protocol_version: PROTOCOL_VERSION.to_string(),
        implementation: Product::new(&options.tool_name, Some(options.tool_version.as_str())),
        runtime: Product::new("rust", None),
        os: Product::new(std::env::consts::OS, None),
        cpu: Product::new(std::env::consts::ARCH, None),
        ci: run.ci.clone(),
    }
}

/// Encode a canonical run into its ordered envelope stream.
pub fn format_envelopes(run: &TestRunResult, options: &MessagesOptions) -> Vec<Envelope> {
    let _span = obs::RunSpan::enter(&run.run_id);
    let ids = MessageIds::new(options.id_salt.clone());
    let scoped = scope_cases(run);
    let groups = group_by_source(&scoped);

    let features: Vec<SynthesizedFeature> = groups
        .iter()
        .map(|g| {
            let cases: Vec<_> = g.cases.iter().map(|s| s.case).collect();
            synthesize_feature(g.uri, &cases)
        })
        .collect();

    let mut out = vec![Envelope::Meta(meta(run, options))];

    if options.include_synthetics {
        for (group, feature) in groups.iter().zip(&features) {
            out.push(Envelope::Source(Source {
                uri: group.uri.to_string(),
                data: feature.text.clone(),
                media_type: GHERKIN_MEDIA_TYPE.to_string(),
            }));
            out.push(Envelope::GherkinDocument(build_gherkin_document(
                group, feature, &ids,
            )));
        }
    }

    for (group, feature) in groups.iter().zip(&features) {
        for (scoped, lines) in group.cases.iter().zip(&feature.scenarios) {
            let lines = options.include_synthetics.then_some(lines);
            out.push(Envelope::Pickle(build_pickle(scoped, lines, &ids)));
        }
    }

    if scoped.iter().any(|s| needs_outcome_step(s.case)) {
        out.push(Envelope::Hook(outcome_hook(&ids)));
    }

    out.push(Envelope::TestRunStarted(TestRunStarted {
        timestamp: Timestamp::from_millis(run.started_at_ms),
        id: Some(run.run_id.clone()),
    }));

    let mut execution = ExecutionBuilder::new(&ids, &run.run_id, run.started_at_ms);
    for case in &scoped {
        execution.push_scenario(case, &mut out);
    }

    let success = run.success();
    out.push(Envelope::TestRunFinished(TestRunFinished {
        message: None,
        success,
        timestamp: Timestamp::from_millis(run.finished_at_ms.max(execution.clock_ms())),
        exception: None,
        test_run_started_id: Some(run.run_id.clone()),
    }));

    obs::emit_stream_encoded(&run.run_id, out.len(), success);
    out
}

/// Serialize envelopes as NDJSON: one object per line, trailing newline.
pub fn envelopes_to_ndjson(envelopes: &[Envelope]) -> Result<String> {
    let mut out = String::new();
    for envelope in envelopes {
        out.push_str(&serde_json::to_string(envelope)?);
        out.push('\n');
    }
    Ok(out)
}

/// Encode a canonical run straight to NDJSON.
pub fn to_ndjson(run: &TestRunResult, options: &MessagesOptions) -> Result<String> {
    envelopes_to_ndjson(&format_envelopes(run, options))
}

/// Write the NDJSON stream for `run` to `path`, creating parent directories.
pub fn write_ndjson(
    path: impl AsRef<Path>,
    run: &TestRunResult,
    options: &MessagesOptions,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let ndjson = to_ndjson(run, options).context("serialize message stream")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {:?}", parent))?;
    }
    std::fs::write(path, ndjson).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_core::{
        StepKeyword, StepResult, StoryMeta, StoryStep, TestCaseResult, TestStatus, SCHEMA_VERSION,
    };

    fn case(file: &str, name: &str, status: TestStatus) -> TestCaseResult {
        TestCaseResult {
            id: name.into(),
            story: StoryMeta {
                scenario: name.into(),
                steps: vec![StoryStep::new(StepKeyword::Given, "anything")],
                tags: vec![],
                tickets: vec![],
                docs: vec![],
                suite_path: None,
            },
            source_file: file.into(),
            source_line: 1,
            status,
            duration_ms: 5,
            error_message: None,
            error_stack: None,
            attachments: vec![],
            step_results: vec![StepResult {
                index: 0,
                status,
                duration_ms: 5,
                error_message: None,
                error_stack: None,
            }],
            tags: vec![],
            title_path: vec![],
            retry: 0,
            retries: 0,
            attempts: None,
            project_name: None,
        }
    }

    fn run(cases: Vec<TestCaseResult>) -> TestRunResult {
        TestRunResult {
            schema_version: SCHEMA_VERSION,
            run_id: "run-1".into(),
            project_root: ".".into(),
            started_at_ms: 0,
            finished_at_ms: 50,
            duration_ms: 50,
            test_cases: cases,
            package_version: None,
            git_sha: None,
            ci: None,
        }
    }

    #[test]
    fn documents_precede_all_pickles() {
        let run = run(vec![
            case("a.ts", "one", TestStatus::Passed),
            case("b.ts", "two", TestStatus::Passed),
        ]);
        let kinds: Vec<_> = format_envelopes(&run, &MessagesOptions::default())
            .iter()
            .map(Envelope::kind)
            .collect();
        assert_eq!(
            &kinds[..7],
            &[
                "meta",
                "source",
                "gherkinDocument",
                "source",
                "gherkinDocument",
                "pickle",
                "pickle"
            ]
        );
        assert_eq!(kinds[7], "testRunStarted");
        assert_eq!(kinds.last(), Some(&"testRunFinished"));
    }

    #[test]
    fn success_requires_every_case_to_pass() {
        let passing = run(vec![case("a.ts", "one", TestStatus::Passed)]);
        let failing = run(vec![
            case("a.ts", "one", TestStatus::Passed),
            case("a.ts", "two", TestStatus::Skipped),
        ]);
        let finished = |r: &TestRunResult| match format_envelopes(r, &MessagesOptions::default())
            .pop()
        {
            Some(Envelope::TestRunFinished(f)) => f.success,
            other => panic!("expected testRunFinished, got {other:?}"),
        };
        assert!(finished(&passing));
        assert!(!finished(&failing));
    }

    #[test]
    fn ndjson_has_one_single_key_object_per_line() {
        let run = run(vec![case("a.ts", "one", TestStatus::Passed)]);
        let ndjson = to_ndjson(&run, &MessagesOptions::default()).unwrap();
        assert!(ndjson.ends_with('\n'));
        for line in ndjson.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value.as_object().unwrap().len(), 1);
        }
    }

    #[test]
    fn meta_names_the_tool() {
        let run = run(vec![]);
        let options = MessagesOptions::default().with_tool("storyline-cli", "9.9.9");
        match &format_envelopes(&run, &options)[0] {
            Envelope::Meta(meta) => {
                assert_eq!(meta.implementation.name, "storyline-cli");
                assert_eq!(meta.implementation.version.as_deref(), Some("9.9.9"));
                assert_eq!(meta.protocol_version, PROTOCOL_VERSION);
            }
            other => panic!("expected meta, got {other:?}"),
        }
    }

    #[test]
    fn write_ndjson_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/cucumber/messages.ndjson");
        let run = run(vec![case("a.ts", "one", TestStatus::Passed)]);
        write_ndjson(&path, &run, &MessagesOptions::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\"meta\":"));
    }
}
