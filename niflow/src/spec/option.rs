use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SpecKind, SpecNotFoundError, SpecificationError};

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Str(String),
    /// List of values.
    List(Vec<OptionValue>),
}

impl OptionValue {
    /// Returns the name of the value's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
        }
    }

    /// Returns true if `self` may override an option whose default is
    /// `default`. Integers are accepted where floats are declared.
    #[must_use]
    pub const fn is_compatible_with(&self, default: &Self) -> bool {
        matches!(
            (self, default),
            (Self::Bool(_), Self::Bool(_))
                | (Self::Int(_), Self::Int(_) | Self::Float(_))
                | (Self::Float(_), Self::Float(_))
                | (Self::Str(_), Self::Str(_))
                | (Self::List(_), Self::List(_))
        )
    }

    /// Returns the boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for OptionValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// A named configuration value with a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    name: String,
    default: OptionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    desc: Option<String>,
}

impl OptionSpec {
    /// Declares an option.
    #[must_use]
    pub fn new(name: impl Into<String>, default: impl Into<OptionValue>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            desc: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Returns the option name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the default value.
    #[must_use]
    pub const fn default_value(&self) -> &OptionValue {
        &self.default
    }

    /// Returns the description.
    #[must_use]
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Checks that `value` can override this option.
    pub fn check(&self, study: &str, value: &OptionValue) -> Result<(), SpecificationError> {
        if value.is_compatible_with(&self.default) {
            Ok(())
        } else {
            Err(SpecificationError::invalid_option(
                study,
                &self.name,
                format!(
                    "expected {}, got {} ({value})",
                    self.default.type_name(),
                    value.type_name()
                ),
            ))
        }
    }

    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: self.default.clone(),
            desc: self.desc.clone(),
        }
    }
}

/// The option values in effect for one pipeline build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionSet {
    #[serde(skip)]
    study: String,
    values: IndexMap<String, OptionValue>,
}

impl OptionSet {
    pub(crate) fn new(study: impl Into<String>, values: IndexMap<String, OptionValue>) -> Self {
        Self {
            study: study.into(),
            values,
        }
    }

    /// Returns the value of an option.
    pub fn get(&self, name: &str) -> Result<&OptionValue, SpecNotFoundError> {
        self.values
            .get(name)
            .ok_or_else(|| SpecNotFoundError::new(SpecKind::Option, name, &self.study))
    }

    /// Returns a boolean option.
    pub fn bool(&self, name: &str) -> Result<bool, SpecificationError> {
        self.typed(name, "bool", OptionValue::as_bool)
    }

    /// Returns an integer option.
    pub fn int(&self, name: &str) -> Result<i64, SpecificationError> {
        self.typed(name, "int", OptionValue::as_int)
    }

    /// Returns a float option.
    pub fn float(&self, name: &str) -> Result<f64, SpecificationError> {
        self.typed(name, "float", OptionValue::as_float)
    }

    /// Returns a string option.
    pub fn str(&self, name: &str) -> Result<&str, SpecificationError> {
        let value = self.lookup(name)?;
        value.as_str().ok_or_else(|| {
            SpecificationError::invalid_option(&self.study, name, format!("expected str, got {}", value.type_name()))
        })
    }

    /// Iterates over all option values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no options.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<&OptionValue, SpecificationError> {
        self.values.get(name).ok_or_else(|| {
            SpecificationError::invalid_option(&self.study, name, "option is not declared")
        })
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: &str,
        get: impl Fn(&OptionValue) -> Option<T>,
    ) -> Result<T, SpecificationError> {
        let value = self.lookup(name)?;
        get(value).ok_or_else(|| {
            SpecificationError::invalid_option(
                &self.study,
                name,
                format!("expected {expected}, got {}", value.type_name()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_overrides_float_option() {
        let spec = OptionSpec::new("framing_th", 2.0);
        assert!(spec.check("md", &OptionValue::Int(3)).is_ok());
        assert!(spec.check("md", &OptionValue::Float(1.5)).is_ok());
        let err = spec.check("md", &OptionValue::from("high")).unwrap_err();
        assert!(err.message.contains("framing_th"));
        assert!(err.message.contains("expected float, got str"));
    }

    #[test]
    fn test_float_does_not_override_int_option() {
        let spec = OptionSpec::new("dof", 6);
        assert!(spec.check("mri", &OptionValue::Float(6.0)).is_err());
    }

    #[test]
    fn test_untagged_deserialization() {
        let values: Vec<OptionValue> = serde_json::from_str(r#"[true, 3, 2.5, "x", [1]]"#).unwrap();
        assert_eq!(
            values,
            vec![
                OptionValue::Bool(true),
                OptionValue::Int(3),
                OptionValue::Float(2.5),
                OptionValue::from("x"),
                OptionValue::from(vec![1]),
            ]
        );
    }

    #[test]
    fn test_option_set_typed_getters() {
        let mut values = IndexMap::new();
        values.insert("framing_th".to_string(), OptionValue::Int(2));
        values.insert("md_framing".to_string(), OptionValue::Bool(true));
        let set = OptionSet::new("md", values);

        assert!((set.float("framing_th").unwrap() - 2.0).abs() < f64::EPSILON);
        assert!(set.bool("md_framing").unwrap());
        assert!(set.str("md_framing").is_err());
        assert!(set.get("missing").is_err());
    }
}
