use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Returns true if `name` can be used as a spec, option, pipeline or
/// sub-study name.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name))
}

/// Identifier of a pipeline factory within a study.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineName(String);

impl PipelineName {
    /// Creates a pipeline name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name this pipeline takes when translated out of the
    /// sub-study `sub_study`.
    #[must_use]
    pub fn prefixed(&self, sub_study: &str) -> Self {
        Self(format!("{sub_study}_{}", self.0))
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PipelineName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PipelineName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for PipelineName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PipelineName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PipelineName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
