//! Task Dependency & Ordering Engine
//!
//! Maintains a directed acyclic dependency graph over tasks, computes
//! critical-path and impact analyses over it, keeps column positions dense
//! under insertion/removal/moves, and aggregates weighted progress over
//! subtask trees.
//!
//! The engine is stateless and reentrant: every call builds its working view
//! from records supplied by a [`repo::GraphRepository`] collaborator and
//! hands mutations back to it. Storage, transport, and authorization live
//! outside this crate.

pub mod config;
pub mod critical_path;
pub mod error;
pub mod graph;
pub mod impact;
pub mod position;
pub mod progress;
pub mod repo;
pub mod types;
