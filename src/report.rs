//! The artifacts written at the end of a validation run.

pub mod package;
pub mod summary;
