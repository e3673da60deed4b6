//! Internal date helpers.

pub(crate) mod date;
