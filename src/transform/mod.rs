//! Conversion of raw openFDA documents into batches, and the filter stages
//! applied to them.

pub mod extract;
pub mod filter;
