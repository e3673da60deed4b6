//! Output rendering for CLI results.

pub mod json;
