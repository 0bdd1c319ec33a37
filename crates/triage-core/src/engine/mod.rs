//! # Engine Module
//!
//! This module implements the gating machinery of the screening funnel: the serialized policy
//! coordinator, the per-shard worker that drives candidates stage by stage, and the seams to the
//! external chemistry engines and policy models.
//!
//! ## Overview
//!
//! A screening run consists of one [`coordinator::Coordinator`] and many
//! [`worker::Worker`]s. Before every stage a worker sends its candidate's accumulated
//! [`StageReport`](crate::core::models::report::StageReport) to the coordinator and blocks
//! until the decision arrives. The coordinator evaluates requests strictly one at a time, so
//! all policy decisions of a run share a single global order.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Pipeline parameters and their builders
//! - **Coordination** ([`coordinator`]) - The policy service and the handles workers talk through
//! - **Workers** ([`worker`]) - The per-candidate state machine and shard scan
//! - **Collaborators** ([`executor`], [`policy`]) - Chemistry engine and policy model interfaces
//! - **Progress Monitoring** ([`progress`]) - Progress reporting and user feedback mechanisms
//! - **Error Handling** ([`error`]) - Stage, coordinator and engine error types

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod policy;
pub mod progress;
pub mod worker;
