//! # Core Module
//!
//! Fundamental, stateless building blocks of the screening funnel.
//!
//! ## Architecture
//!
//! - **Data Model** ([`models`]) - Candidates, pipeline stages, stage reports and decisions
//! - **File I/O** ([`io`]) - Ligand list parsing, per-candidate metrics records and result tables
//! - **Work Distribution** ([`partition`]) - Deterministic even slicing of a candidate list into shards

pub mod io;
pub mod models;
pub mod partition;
