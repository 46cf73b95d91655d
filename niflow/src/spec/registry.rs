use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{is_valid_identifier, DataSpec, OptionSpec};
use crate::errors::{SpecKind, SpecNotFoundError, SpecificationError};

/// A spec type that can be stored in a [`Registry`].
pub trait NamedSpec: Clone + fmt::Debug {
    /// The registry kind reported in lookup errors.
    const KIND: SpecKind;
    /// Noun used in diagnostics.
    const NOUN: &'static str;

    /// Returns the name the spec is registered under.
    fn spec_name(&self) -> &str;
}

impl NamedSpec for DataSpec {
    const KIND: SpecKind = SpecKind::Data;
    const NOUN: &'static str = "data spec";

    fn spec_name(&self) -> &str {
        self.name()
    }
}

impl NamedSpec for OptionSpec {
    const KIND: SpecKind = SpecKind::Option;
    const NOUN: &'static str = "option";

    fn spec_name(&self) -> &str {
        self.name()
    }
}

/// Where a registry entry was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum SpecOrigin {
    /// Declared by the study itself.
    Own,
    /// Inherited from the named base study.
    Base(String),
    /// Re-keyed from the named sub-study.
    SubStudy(String),
}

impl fmt::Display for SpecOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Own => write!(f, "own"),
            Self::Base(name) => write!(f, "base '{name}'"),
            Self::SubStudy(name) => write!(f, "sub-study '{name}'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    spec: T,
    origin: SpecOrigin,
}

/// An immutable, ordered name-to-spec mapping for one study.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    study: String,
    entries: IndexMap<String, Entry<T>>,
}

/// Registry of dataset and field specs.
pub type SpecRegistry = Registry<DataSpec>;
/// Registry of option specs.
pub type OptionRegistry = Registry<OptionSpec>;

impl<T: NamedSpec> Registry<T> {
    /// Looks up a spec, failing with an error naming the spec and study.
    pub fn get(&self, name: &str) -> Result<&T, SpecNotFoundError> {
        self.find(name)
            .ok_or_else(|| SpecNotFoundError::new(T::KIND, name, &self.study))
    }

    /// Looks up a spec.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&T> {
        self.entries.get(name).map(|entry| &entry.spec)
    }

    /// Returns where a spec was declared.
    #[must_use]
    pub fn origin(&self, name: &str) -> Option<&SpecOrigin> {
        self.entries.get(name).map(|entry| &entry.origin)
    }

    /// Returns true if the name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over specs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|entry| &entry.spec)
    }

    /// Iterates over registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the study the registry belongs to.
    #[must_use]
    pub fn study(&self) -> &str {
        &self.study
    }
}

/// Builds a [`Registry`] from declaration layers.
#[derive(Debug)]
pub struct RegistryBuilder<T> {
    study: String,
    entries: IndexMap<String, Entry<T>>,
}

impl<T: NamedSpec> RegistryBuilder<T> {
    /// Creates an empty builder for `study`.
    #[must_use]
    pub fn new(study: impl Into<String>) -> Self {
        Self {
            study: study.into(),
            entries: IndexMap::new(),
        }
    }

    /// Adds one declaration layer.
    ///
    /// Names must be unique within the layer. Entries replace any entry
    /// of the same name from earlier layers.
    pub fn layer(
        &mut self,
        origin: &SpecOrigin,
        specs: impl IntoIterator<Item = T>,
    ) -> Result<(), SpecificationError> {
        let mut seen: Vec<String> = Vec::new();
        let mut layer = Vec::new();
        for spec in specs {
            let name = spec.spec_name();
            if !is_valid_identifier(name) {
                return Err(SpecificationError::invalid_name(&self.study, name));
            }
            if seen.iter().any(|s| s == name) {
                return Err(SpecificationError::duplicate(&self.study, T::NOUN, name));
            }
            seen.push(name.to_string());
            layer.push(spec);
        }
        for spec in layer {
            self.insert(origin.clone(), spec);
        }
        Ok(())
    }

    /// Inserts a single entry, replacing any existing entry of that name.
    /// Returns the replaced spec.
    pub fn insert(&mut self, origin: SpecOrigin, spec: T) -> Option<T> {
        let name = spec.spec_name().to_string();
        let previous = self.entries.insert(name.clone(), Entry { spec, origin });
        if let Some(previous) = &previous {
            tracing::debug!(
                study = %self.study,
                name = %name,
                replaced = %previous.origin,
                "spec overridden"
            );
        }
        previous.map(|entry| entry.spec)
    }

    /// Looks up an entry added so far.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name).map(|entry| &entry.spec)
    }

    /// Iterates over the specs added so far.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|entry| &entry.spec)
    }

    /// Freezes the builder.
    #[must_use]
    pub fn build(self) -> Registry<T> {
        Registry {
            study: self.study,
            entries: self.entries,
        }
    }
}
