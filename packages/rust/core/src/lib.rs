//! Core pipeline orchestration and domain logic for Sheetwright.
//!
//! This crate ties together task dispatch, row selection, generation and
//! write-back into end-to-end batch runs (e.g., `Runner::process_one`).

pub mod dispatch;
pub mod generation;
pub mod pipeline;
pub mod prompt;
pub mod scheduler;
pub mod selector;
pub mod sink;

#[cfg(test)]
mod testing;
