//! Typed adverse-event records and the per-run batch aggregate.

pub mod event;
