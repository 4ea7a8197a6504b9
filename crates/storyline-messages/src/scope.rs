//! Scenario scoping and protocol identifiers.
//!
//! Every protocol id is derived from the scenario's source uri and name.
//! Two scenarios with the same name in one file are told apart by their
//! occurrence ordinal, which only enters the id when it is non-zero so the
//! common case keeps the plain `(uri, name)` parts.

use std::collections::HashMap;

use storyline_core::{IdGenerator, IdKind, TestCaseResult, TestRunResult};

/// Where a scenario sits: its file and its occurrence among same-named
/// scenarios in that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioScope<'a> {
    pub uri: &'a str,
    pub name: &'a str,
    pub ordinal: usize,
}

impl<'a> ScenarioScope<'a> {
    fn parts(&self, extra: &[String]) -> Vec<String> {
        let mut parts = vec![self.uri.to_string(), self.name.to_string()];
        if self.ordinal > 0 {
            parts.push(format!("#{}", self.ordinal));
        }
        parts.extend(extra.iter().cloned());
        parts
    }
}

/// A scenario paired with its scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopedCase<'a> {
    pub case: &'a TestCaseResult,
    pub scope: ScenarioScope<'a>,
}

/// All scenarios of one source file, in declaration order.
#[derive(Debug, Clone)]
pub struct SourceGroup<'a> {
    pub uri: &'a str,
    pub cases: Vec<ScopedCase<'a>>,
}

/// Scope every case of `run`, keeping run order.
pub fn scope_cases(run: &TestRunResult) -> Vec<ScopedCase<'_>> {
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    run.test_cases
        .iter()
        .map(|case| {
            let key = (case.source_file.as_str(), case.story.scenario.as_str());
            let counter = seen.entry(key).or_insert(0);
            let ordinal = *counter;
            *counter += 1;
            ScopedCase {
                case,
                scope: ScenarioScope {
                    uri: key.0,
                    name: key.1,
                    ordinal,
                },
            }
        })
        .collect()
}

/// Group scoped cases by source file, files in first-appearance order.
pub fn group_by_source<'a>(cases: &[ScopedCase<'a>]) -> Vec<SourceGroup<'a>> {
    let mut groups: Vec<SourceGroup<'a>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for scoped in cases {
        let uri = scoped.scope.uri;
        let slot = *index.entry(uri).or_insert_with(|| {
            groups.push(SourceGroup {
                uri,
                cases: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].cases.push(*scoped);
    }
    groups
}

/// Protocol id factory bound to one salt.
#[derive(Debug, Clone)]
pub struct MessageIds {
    ids: IdGenerator,
}

impl MessageIds {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            ids: IdGenerator::new(salt),
        }
    }

    pub fn feature_tag(&self, uri: &str, tag: &str) -> String {
        self.ids.id(IdKind::Tag, &[uri, "feature", tag])
    }

    pub fn scenario_tag(&self, scope: &ScenarioScope<'_>, tag: &str) -> String {
        self.ids.id(IdKind::Tag, &scope.parts(&[tag.to_string()]))
    }

    pub fn scenario(&self, scope: &ScenarioScope<'_>) -> String {
        self.ids.id(IdKind::Scenario, &scope.parts(&[]))
    }

    pub fn step(&self, scope: &ScenarioScope<'_>, step: usize) -> String {
        self.ids.id(IdKind::Step, &scope.parts(&[step.to_string()]))
    }

    pub fn table_row(&self, scope: &ScenarioScope<'_>, step: usize, row: usize) -> String {
        self.ids.id(
            IdKind::DataTableRow,
            &scope.parts(&[step.to_string(), row.to_string()]),
        )
    }

    pub fn pickle(&self, scope: &ScenarioScope<'_>) -> String {
        self.ids.id(IdKind::Pickle, &scope.parts(&[]))
    }

    pub fn pickle_step(&self, scope: &ScenarioScope<'_>, step: usize) -> String {
        self.ids.id(IdKind::PickleStep, &scope.parts(&[step.to_string()]))
    }

    pub fn test_case(&self, scope: &ScenarioScope<'_>) -> String {
        self.ids.id(IdKind::ProtocolTestCase, &scope.parts(&[]))
    }

    pub fn test_step(&self, scope: &ScenarioScope<'_>, step: usize) -> String {
        self.ids.id(IdKind::TestStep, &scope.parts(&[step.to_string()]))
    }

    /// Test step that reports a scenario's outcome when no step can.
    pub fn outcome_step(&self, scope: &ScenarioScope<'_>) -> String {
        self.ids.id(IdKind::TestStep, &scope.parts(&["outcome".to_string()]))
    }

    /// The run-wide hook behind every outcome step.
    pub fn outcome_hook(&self) -> String {
        self.ids.id(IdKind::Hook, &["scenario-outcome"])
    }

    pub fn test_case_started(&self, scope: &ScenarioScope<'_>, attempt: u32) -> String {
        self.ids.id(
            IdKind::TestCaseStarted,
            &scope.parts(&[attempt.to_string()]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_core::{StoryMeta, TestStatus, SCHEMA_VERSION};

    fn case(file: &str, name: &str) -> TestCaseResult {
        TestCaseResult {
            id: format!("{file}:{name}"),
            story: StoryMeta {
                scenario: name.into(),
                steps: vec![],
                tags: vec![],
                tickets: vec![],
                docs: vec![],
                suite_path: None,
            },
            source_file: file.into(),
            source_line: 1,
            status: TestStatus::Passed,
            duration_ms: 0,
            error_message: None,
            error_stack: None,
            attachments: vec![],
            step_results: vec![],
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
            run_id: "r".into(),
            project_root: ".".into(),
            started_at_ms: 0,
            finished_at_ms: 0,
            duration_ms: 0,
            test_cases: cases,
            package_version: None,
            git_sha: None,
            ci: None,
        }
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let run = run(vec![case("b.ts", "one"), case("a.ts", "two"), case("b.ts", "three")]);
        let scoped = scope_cases(&run);
        let groups = group_by_source(&scoped);
        assert_eq!(groups.iter().map(|g| g.uri).collect::<Vec<_>>(), vec!["b.ts", "a.ts"]);
        assert_eq!(groups[0].cases.len(), 2);
        assert_eq!(groups[0].cases[1].case.story.scenario, "three");
    }

    #[test]
    fn duplicate_names_get_distinct_ids() {
        let run = run(vec![case("a.ts", "same"), case("a.ts", "same"), case("b.ts", "same")]);
        let scoped = scope_cases(&run);
        assert_eq!(scoped[0].scope.ordinal, 0);
        assert_eq!(scoped[1].scope.ordinal, 1);
        assert_eq!(scoped[2].scope.ordinal, 0);

        let ids = MessageIds::new("salt");
        let first = ids.pickle(&scoped[0].scope);
        assert_ne!(first, ids.pickle(&scoped[1].scope));
        assert_ne!(first, ids.pickle(&scoped[2].scope));
        assert_eq!(first, ids.pickle(&scoped[0].scope));
    }

    #[test]
    fn kinds_do_not_collide() {
        let run = run(vec![case("a.ts", "x")]);
        let scoped = scope_cases(&run);
        let ids = MessageIds::new("");
        let scope = &scoped[0].scope;
        assert_ne!(ids.pickle(scope), ids.test_case(scope));
        assert_ne!(ids.step(scope, 0), ids.pickle_step(scope, 0));
        assert_ne!(ids.outcome_step(scope), ids.test_step(scope, 0));
        assert_eq!(ids.outcome_hook(), MessageIds::new("").outcome_hook());
    }
}
