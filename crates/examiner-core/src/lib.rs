//! examiner-core — Timed assessment engine, ports, and scoring.
//!
//! This crate defines the assessment data model, the collaborator traits
//! for question generation, grading and result storage, and the state
//! machine that drives one student's attempt from selection to results.

pub mod countdown;
pub mod driver;
pub mod engine;
pub mod error;
pub mod model;
pub mod scoring;
pub mod session;
pub mod traits;

#[cfg(test)]
mod testing;
