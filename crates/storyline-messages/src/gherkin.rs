//! Document (`gherkinDocument`) and compiled-scenario (`pickle`) builders.

use crate::envelope::{
    DataTable, DocString, Feature, FeatureChild, GherkinDocument, Location, Pickle,
    PickleDocString, PickleStep, PickleStepArgument, PickleTable, PickleTableCell,
    PickleTableRow, PickleTag, Scenario, Step, TableCell, TableRow, Tag,
};
use crate::scope::{MessageIds, ScopedCase, SourceGroup};
use crate::step_args::{keyword_types, step_argument, StepArgument};
use crate::synth::{tag_columns, ScenarioLines, SynthesizedFeature, SCENARIO_COLUMN, STEP_COLUMN};

pub const LANGUAGE: &str = "en";
const DOC_STRING_DELIMITER: &str = "\"\"\"";
const ARGUMENT_COLUMN: u32 = STEP_COLUMN + 2;

// Step arguments are not rendered in the synthesized text, so doc strings
// and every table row cite the line of the step that owns them.

/// Build the document for one source file from its synthesized text.
pub fn build_gherkin_document(
    group: &SourceGroup<'_>,
    feature: &SynthesizedFeature,
    ids: &MessageIds,
) -> GherkinDocument {
    let tag_line = feature.tag_line.unwrap_or(feature.line);
    let tags = feature
        .tags
        .iter()
        .zip(tag_columns(&feature.tags, 1))
        .map(|(name, column)| Tag {
            location: Location::at(tag_line, column),
            name: format!("@{name}"),
            id: ids.feature_tag(group.uri, name),
        })
        .collect();

    let children = group
        .cases
        .iter()
        .zip(&feature.scenarios)
        .map(|(scoped, lines)| FeatureChild {
            scenario: Some(build_scenario(scoped, lines, ids)),
            ..Default::default()
        })
        .collect();

    GherkinDocument {
        uri: Some(group.uri.to_string()),
        feature: Some(Feature {
            location: Location::at(feature.line, 1),
            tags,
            language: LANGUAGE.to_string(),
            keyword: "Feature".to_string(),
            name: feature.name.clone(),
            description: String::new(),
            children,
        }),
        comments: Vec::new(),
    }
}

fn build_scenario(scoped: &ScopedCase<'_>, lines: &ScenarioLines, ids: &MessageIds) -> Scenario {
    let case = scoped.case;
    let scope = &scoped.scope;
    let tag_line = lines.tag_line.unwrap_or(lines.line);
    let tags = case
        .tags
        .iter()
        .zip(tag_columns(&case.tags, SCENARIO_COLUMN))
        .map(|(name, column)| Tag {
            location: Location::at(tag_line, column),
            name: format!("@{name}"),
            id: ids.scenario_tag(scope, name),
        })
        .collect();

    let types = keyword_types(&case.story.steps);
    let steps = case
        .story
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let line = lines.step_lines.get(i).copied().unwrap_or(lines.line);
            let (doc_string, data_table) = match step_argument(&step.docs) {
                Some(StepArgument::DocString {
                    content,
                    media_type,
                }) => (
                    Some(DocString {
                        location: Location::at(line, ARGUMENT_COLUMN),
                        media_type,
                        content,
                        delimiter: DOC_STRING_DELIMITER.to_string(),
                    }),
                    None,
                ),
                Some(StepArgument::DataTable { rows }) => (
                    None,
                    Some(data_table(&rows, line, |r| ids.table_row(scope, i, r))),
                ),
                None => (None, None),
            };
            Step {
                location: Location::at(line, STEP_COLUMN),
                keyword: format!("{} ", step.keyword.as_str()),
                keyword_type: Some(types[i]),
                text: step.text.clone(),
                doc_string,
                data_table,
                id: ids.step(scope, i),
            }
        })
        .collect();

    Scenario {
        location: Location::at(lines.line, SCENARIO_COLUMN),
        tags,
        keyword: "Scenario".to_string(),
        name: case.story.scenario.clone(),
        description: String::new(),
        steps,
        examples: Vec::new(),
        id: ids.scenario(scope),
    }
}

fn data_table(rows: &[Vec<String>], line: u32, row_id: impl Fn(usize) -> String) -> DataTable {
    let rows = rows
        .iter()
        .enumerate()
        .map(|(r, values)| {
            // "| a | b |": each value starts two columns after its pipe.
            let mut column = ARGUMENT_COLUMN + 2;
            let cells = values
                .iter()
                .map(|value| {
                    let cell = TableCell {
                        location: Location::at(line, column),
                        value: value.clone(),
                    };
                    column += value.chars().count() as u32 + 3;
                    cell
                })
                .collect();
            TableRow {
                location: Location::at(line, ARGUMENT_COLUMN),
                cells,
                id: row_id(r),
            }
        })
        .collect();
    DataTable {
        location: Location::at(line, ARGUMENT_COLUMN),
        rows,
    }
}

/// Build the compiled form of one scenario.
///
/// `lines` is the scenario's synthesized position, when a document was
/// rendered for it. AST node ids are always set: they are derived from the
/// same parts whether or not the document is emitted.
pub fn build_pickle(scoped: &ScopedCase<'_>, lines: Option<&ScenarioLines>, ids: &MessageIds) -> Pickle {
    let case = scoped.case;
    let scope = &scoped.scope;
    let types = keyword_types(&case.story.steps);

    let steps = case
        .story
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| PickleStep {
            argument: step_argument(&step.docs).map(pickle_argument),
            ast_node_ids: vec![ids.step(scope, i)],
            id: ids.pickle_step(scope, i),
            step_type: Some(types[i]),
            text: step.text.clone(),
        })
        .collect();

    let tags = case
        .tags
        .iter()
        .map(|name| PickleTag {
            name: format!("@{name}"),
            ast_node_id: ids.scenario_tag(scope, name),
        })
        .collect();

    Pickle {
        id: ids.pickle(scope),
        uri: scope.uri.to_string(),
        location: lines.map(|l| Location::at(l.line, SCENARIO_COLUMN)),
        name: case.story.scenario.clone(),
        language: LANGUAGE.to_string(),
        steps,
        tags,
        ast_node_ids: vec![ids.scenario(scope)],
    }
}

fn pickle_argument(argument: StepArgument) -> PickleStepArgument {
    match argument {
        StepArgument::DocString {
            content,
            media_type,
        } => PickleStepArgument {
            doc_string: Some(PickleDocString {
                media_type,
                content,
            }),
            data_table: None,
        },
        StepArgument::DataTable { rows } => PickleStepArgument {
            doc_string: None,
            data_table: Some(PickleTable {
                rows: rows
                    .into_iter()
                    .map(|cells| PickleTableRow {
                        cells: cells
                            .into_iter()
                            .map(|value| PickleTableCell { value })
                            .collect(),
                    })
                    .collect(),
            }),
        },
    }
}
