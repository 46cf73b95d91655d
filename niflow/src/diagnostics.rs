//! Suggestion registry mapping diagnostic codes to remediation hints.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::errors::codes;

/// Structured remediation info for a diagnostic code.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// Code this suggestion applies to.
    pub code: String,
    /// Short title for the error.
    pub title: String,
    /// Detailed summary of the issue.
    pub summary: String,
    /// Steps to fix the issue.
    pub fix_steps: Vec<String>,
}

impl Suggestion {
    /// Creates a new suggestion.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        fix_steps: Vec<String>,
    ) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            summary: summary.into(),
            fix_steps,
        }
    }
}

fn preload(map: &mut HashMap<String, Suggestion>, code: &str, title: &str, summary: &str, steps: &[&str]) {
    map.insert(
        code.to_string(),
        Suggestion::new(
            code,
            title,
            summary,
            steps.iter().map(|s| (*s).to_string()).collect(),
        ),
    );
}

static SUGGESTIONS: LazyLock<RwLock<HashMap<String, Suggestion>>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    preload(
        &mut map,
        codes::DUPLICATE,
        "Duplicate Declaration",
        "The same name is declared twice in one study layer.",
        &[
            "Remove one of the declarations",
            "To replace an inherited spec, redeclare it in the derived study only",
        ],
    );
    preload(
        &mut map,
        codes::UNKNOWN_PRODUCER,
        "Unknown Producer Pipeline",
        "A spec names a producing pipeline that the study does not register.",
        &[
            "Register a pipeline factory under the producer name",
            "Or correct the producer name on the spec",
        ],
    );
    preload(
        &mut map,
        codes::INVALID_NAME_MAP,
        "Invalid Sub-Study Name Map",
        "The translation map of a sub-study is not invertible or names specs the component lacks.",
        &[
            "Map each internal name at most once",
            "Use each external name at most once",
            "Check the internal names against the component study's specs",
        ],
    );
    preload(
        &mut map,
        codes::COMPOSITION_CYCLE,
        "Recursive Study Composition",
        "A study contains itself through its bases or sub-studies.",
        &["Remove the study from its own base or sub-study chain"],
    );
    preload(
        &mut map,
        codes::INVALID_NAME,
        "Invalid Name",
        "Names must start with a letter or underscore and contain only letters, digits and underscores.",
        &["Rename the spec"],
    );
    preload(
        &mut map,
        codes::TYPE_MISMATCH,
        "Type Mismatch",
        "Two declarations of the same name disagree on format or value type.",
        &["Align the format of the input with the spec it refines"],
    );
    preload(
        &mut map,
        codes::INVALID_OPTION,
        "Invalid Option Value",
        "An option override does not match the type of the option's default.",
        &["Pass a value of the same type as the declared default"],
    );
    preload(
        &mut map,
        codes::UNCONNECTED,
        "Unconnected Port",
        "A declared input or output, or a mandatory tool port, has no connection.",
        &[
            "Connect every declared input to a node port with connect_input",
            "Connect every declared output with connect_output",
            "Connect or parameterise every mandatory node port",
        ],
    );
    preload(
        &mut map,
        codes::FOREIGN_OUTPUT,
        "Output Owned By Another Pipeline",
        "A pipeline declares an output the study attributes to a different producer.",
        &[
            "Declare the output on the producing pipeline instead",
            "Or change the spec's producer to this pipeline",
        ],
    );
    preload(
        &mut map,
        codes::NO_PRODUCER,
        "Missing Producer",
        "A required spec is neither produced by a pipeline nor provided as an input.",
        &["Provide the spec as a study input", "Or declare a producer pipeline for it"],
    );
    preload(
        &mut map,
        codes::UNKNOWN_NODE,
        "Unknown Node",
        "A connection references a node that was not added to the pipeline.",
        &["Add the node before connecting it"],
    );
    preload(
        &mut map,
        codes::UNKNOWN_PORT,
        "Unknown Port",
        "A connection references a port the tool interface does not define, or a spec the pipeline did not declare.",
        &["Check the port name against the tool interface", "Declare the spec with input() or output() first"],
    );
    preload(
        &mut map,
        codes::DUPLICATE_WIRING,
        "Duplicate Wiring",
        "A node, declaration or port source is defined twice.",
        &["Remove the duplicate", "Merge multiple sources through a merge node"],
    );
    preload(
        &mut map,
        codes::CYCLE,
        "Dependency Cycle Detected",
        "Nodes or pipelines depend on each other in a loop.",
        &["Review the reported cycle path", "Remove at least one edge to break the loop"],
    );
    preload(
        &mut map,
        codes::KIND_MISMATCH,
        "Translated Type Mismatch",
        "A sub-study spec maps onto a containing-study spec with a different format.",
        &["Fix the sub-study name map or the containing study's declaration"],
    );
    preload(
        &mut map,
        codes::MISSING_OUTPUT,
        "Producer Missing Output",
        "The pipeline named as producer does not declare the spec as an output.",
        &["Declare the output in the producer pipeline", "Or attribute the spec to the right producer"],
    );

    RwLock::new(map)
});

/// Register a suggestion for a code.
pub fn register_suggestion(suggestion: Suggestion) {
    SUGGESTIONS.write().insert(suggestion.code.clone(), suggestion);
}

/// Return suggestion metadata for a code if registered.
#[must_use]
pub fn get_suggestion(code: &str) -> Option<Suggestion> {
    SUGGESTIONS.read().get(code).cloned()
}

/// Returns all registered suggestions.
#[must_use]
pub fn list_suggestions() -> Vec<Suggestion> {
    SUGGESTIONS.read().values().cloned().collect()
}
