//! Data, field and option specifications and the registries that hold them.
//!
//! A study's registry is built in layers. Each layer is one declaration
//! source (a base study, a sub-study, the study itself) and later layers
//! replace earlier entries of the same name wholesale.

mod data;
mod names;
mod option;
mod registry;

pub use data::{DataKind, DataSpec};
pub use names::{is_valid_identifier, PipelineName};
pub use option::{OptionSet, OptionSpec, OptionValue};
pub use registry::{NamedSpec, OptionRegistry, Registry, RegistryBuilder, SpecOrigin, SpecRegistry};
