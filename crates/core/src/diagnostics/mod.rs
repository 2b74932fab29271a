//! Diagnostics module.
//!
//! Tracks provenance, coverage, run id and generation time per entity and
//! reports drift through a [`DiagnosticsSink`].

mod diagnostics_differ;
mod diagnostics_model;
mod sink;

pub use diagnostics_differ::*;
pub use diagnostics_model::*;
pub use sink::*;

#[cfg(test)]
mod diagnostics_differ_tests;
