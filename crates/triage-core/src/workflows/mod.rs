//! # Workflows Module
//!
//! High-level entry points that run a complete screening job, from validated configuration to
//! the result tables on disk.
//!
//! ## Architecture
//!
//! - **Gated Screening** ([`screen`]) - The policy-gated funnel: one coordinator task and one
//!   worker per shard, every stage admitted by the policy oracle.
//! - **Bulk Batch** ([`batch`]) - The non-gated mode: a single stage over every candidate,
//!   sharded across a thread pool, collected into one table in input order.

pub mod batch;
pub mod screen;
