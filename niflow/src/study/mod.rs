//! Study composition and name resolution.
//!
//! A [`StudyDefinition`] is composed once from its own declarations, its
//! base studies and its sub-studies, and is immutable afterwards. A
//! [`Study`] is an instance of a definition with option overrides and
//! provided inputs.

mod definition;
mod instance;
mod sub_study;
mod translate;

#[cfg(test)]
mod integration_tests;

pub use definition::{StudyBuilder, StudyDefinition};
pub use instance::{InputMatch, Study, StudyInstanceBuilder};
pub use sub_study::{NameMap, SubStudySpec};
pub use translate::translate;
