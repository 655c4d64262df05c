//! Core infrastructure for gosift.
//!
//! This crate provides the language-agnostic parts of the pipeline:
//! - The impact data model (symbols, tests, usage edges, test jobs)
//! - Error types for surfaced failures
//! - Adapter traits for the external collaborators (VCS diff, build oracle)
//! - Selection strategies mapping the impact graph to test jobs
//! - Human-readable dumps and the JSON selection report

pub mod adapter;
pub mod error;
pub mod output;
pub mod strategy;
pub mod types;
