//! # Ligand Triage Core Library
//!
//! A coordinator for policy-gated virtual screening funnels. Candidate ligands are pushed
//! through increasingly expensive stages (docking, parameterization and minimization,
//! free-energy sampling), and before every stage a central policy service decides whether
//! the candidate deserves the next, more expensive computation.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Candidate`, `StageReport`,
//!   `Decision`), ligand list and metrics table I/O, and the static shard partitioner.
//!
//! - **[`engine`]: The Logic Core.** The collaborator seams (`StageExecutor`,
//!   `PolicyOracle`), the serialized policy `Coordinator`, the per-shard `Worker`
//!   pipeline driver, configuration, progress reporting and error types.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie the engine and core
//!   together: the gated [`workflows::screen`] funnel and the non-gated
//!   [`workflows::batch`] bulk runner.

pub mod core;
pub mod engine;
pub mod workflows;
