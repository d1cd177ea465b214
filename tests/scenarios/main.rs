//! Scenario tests for pipeline execution

#[path = "../helpers/mod.rs"]
mod helpers;

mod chooser;
mod conditional;
mod end_to_end;
mod merge_algebra;
mod scoped_objects;
mod short_circuit;
