//! Synthesized feature text.
//!
//! Frameworks that run stories from ordinary test files have no authored
//! `.feature` document. The synthesizer renders one from the canonical
//! scenarios of a source file, together with the line numbers every
//! document node will cite. Layout:
//!
//! ```text
//! @a @b                 <- union of scenario tags, only when non-empty
//! Feature: <name>
//!
//!   @a                  <- only when the scenario is tagged
//!   Scenario: <name>
//!     Given <text>
//!     And <text>
//!
//! ```
//!
//! Line numbers depend only on scenario order, tag presence and step counts.

use std::collections::{BTreeMap, BTreeSet};

use storyline_core::TestCaseResult;

/// Media type of a synthesized `source` envelope.
pub const GHERKIN_MEDIA_TYPE: &str = "text/x.cucumber.gherkin+plain";

/// Column of scenario-level nodes.
pub const SCENARIO_COLUMN: u32 = 3;
/// Column of step lines.
pub const STEP_COLUMN: u32 = 5;

/// Line numbers of one synthesized scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioLines {
    pub name: String,
    pub tag_line: Option<u32>,
    pub line: u32,
    pub step_lines: Vec<u32>,
}

/// A rendered feature document plus its line map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedFeature {
    pub uri: String,
    pub name: String,
    pub tags: Vec<String>,
    pub tag_line: Option<u32>,
    pub line: u32,
    pub text: String,
    /// One entry per scenario, in the order they were given.
    pub scenarios: Vec<ScenarioLines>,
}

impl SynthesizedFeature {
    /// Line map keyed by scenario name. The first of several same-named
    /// scenarios wins; use `scenarios` for positional access.
    pub fn line_map(&self) -> BTreeMap<&str, &ScenarioLines> {
        let mut map = BTreeMap::new();
        for lines in &self.scenarios {
            map.entry(lines.name.as_str()).or_insert(lines);
        }
        map
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioLines> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

/// Display name for a feature: the first case's top-level title segment,
/// else the file name without its extensions.
pub fn feature_name(uri: &str, cases: &[&TestCaseResult]) -> String {
    if let Some(first) = cases
        .first()
        .and_then(|c| c.title_path.first())
        .filter(|s| !s.trim().is_empty())
    {
        return first.clone();
    }
    let file = uri.rsplit(['/', '\\']).next().unwrap_or(uri);
    match file.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

/// Render the feature text and line map for one source file.
pub fn synthesize_feature(uri: &str, cases: &[&TestCaseResult]) -> SynthesizedFeature {
    let name = feature_name(uri, cases);
    let tags: Vec<String> = cases
        .iter()
        .flat_map(|c| c.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut text = String::new();
    let mut line = 0u32;
    let mut push = |text: &mut String, content: &str| -> u32 {
        line += 1;
        text.push_str(content);
        text.push('\n');
        line
    };

    let tag_line = (!tags.is_empty()).then(|| push(&mut text, &tag_line_text(&tags, "")));
    let feature_line = push(&mut text, &format!("Feature: {name}"));
    push(&mut text, "");

    let mut scenarios = Vec::with_capacity(cases.len());
    for case in cases {
        let scenario_tag_line =
            (!case.tags.is_empty()).then(|| push(&mut text, &tag_line_text(&case.tags, "  ")));
        let scenario_line = push(&mut text, &format!("  Scenario: {}", case.story.scenario));
        let step_lines = case
            .story
            .steps
            .iter()
            .map(|step| push(&mut text, &format!("    {} {}", step.keyword.as_str(), step.text)))
            .collect();
        push(&mut text, "");
        scenarios.push(ScenarioLines {
            name: case.story.scenario.clone(),
            tag_line: scenario_tag_line,
            line: scenario_line,
            step_lines,
        });
    }

    SynthesizedFeature {
        uri: uri.to_string(),
        name,
        tags,
        tag_line,
        line: feature_line,
        text,
        scenarios,
    }
}

fn tag_line_text(tags: &[String], indent: &str) -> String {
    let rendered: Vec<String> = tags.iter().map(|t| format!("@{t}")).collect();
    format!("{indent}{}", rendered.join(" "))
}

/// Column of each tag on a tag line starting at `first_column`.
pub fn tag_columns(tags: &[String], first_column: u32) -> Vec<u32> {
    let mut column = first_column;
    tags.iter()
        .map(|tag| {
            let at = column;
            // "@" + name + separating space
            column += tag.chars().count() as u32 + 2;
            at
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_core::{StepKeyword, StoryMeta, StoryStep, TestStatus};

    fn case(name: &str, tags: &[&str], steps: &[(StepKeyword, &str)]) -> TestCaseResult {
        TestCaseResult {
            id: name.into(),
            story: StoryMeta {
                scenario: name.into(),
                steps: steps.iter().map(|(k, t)| StoryStep::new(*k, *t)).collect(),
                tags: vec![],
                tickets: vec![],
                docs: vec![],
                suite_path: None,
            },
            source_file: "src/cart.story.test.ts".into(),
            source_line: 1,
            status: TestStatus::Passed,
            duration_ms: 0,
            error_message: None,
            error_stack: None,
            attachments: vec![],
            step_results: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            title_path: vec![],
            retry: 0,
            retries: 0,
            attempts: None,
            project_name: None,
        }
    }

    #[test]
    fn renders_text_and_line_map() {
        let a = case(
            "adds item",
            &["cart", "smoke"],
            &[(StepKeyword::Given, "an empty cart"), (StepKeyword::When, "I add a book")],
        );
        let b = case("removes item", &[], &[(StepKeyword::Then, "the cart is empty")]);
        let feature = synthesize_feature("src/cart.story.test.ts", &[&a, &b]);

        let expected = "\
@cart @smoke
Feature: cart

  @cart @smoke
  Scenario: adds item
    Given an empty cart
    When I add a book

  Scenario: removes item
    Then the cart is empty

";
        assert_eq!(feature.text, expected);
        assert_eq!(feature.tag_line, Some(1));
        assert_eq!(feature.line, 2);

        let map = feature.line_map();
        let adds = map["adds item"];
        assert_eq!(adds.tag_line, Some(4));
        assert_eq!(adds.line, 5);
        assert_eq!(adds.step_lines, vec![6, 7]);
        let removes = feature.scenario("removes item").unwrap();
        assert_eq!(removes.tag_line, None);
        assert_eq!(removes.line, 9);
        assert_eq!(removes.step_lines, vec![10]);
    }

    #[test]
    fn untagged_feature_starts_with_feature_line() {
        let a = case("solo", &[], &[(StepKeyword::Given, "x")]);
        let feature = synthesize_feature("solo.test.ts", &[&a]);
        assert_eq!(feature.tag_line, None);
        assert_eq!(feature.line, 1);
        assert!(feature.text.starts_with("Feature: solo\n"));
    }

    #[test]
    fn feature_name_prefers_title_path() {
        let mut a = case("x", &[], &[]);
        assert_eq!(feature_name("dir/login.spec.ts", &[&a]), "login");
        a.title_path = vec!["Login".into()];
        assert_eq!(feature_name("dir/login.spec.ts", &[&a]), "Login");
    }

    #[test]
    fn synthesis_is_deterministic() {
        let a = case("x", &["t"], &[(StepKeyword::Given, "y")]);
        assert_eq!(
            synthesize_feature("f.ts", &[&a]),
            synthesize_feature("f.ts", &[&a])
        );
    }

    #[test]
    fn tag_columns_account_for_at_sign_and_spacing() {
        let tags = vec!["a".to_string(), "smoke".to_string(), "b".to_string()];
        assert_eq!(tag_columns(&tags, 3), vec![3, 6, 13]);
    }
}
