// src/supervisor/mod.rs
//! Mining loop supervision
//!
//! Ties the pool, the submitter and the stats tracker into the sequential
//! cycle loop used by both `mine` and `mine --forever`.

/// Cycle loop and failure classification
pub mod forever;

pub use forever::{CycleResult, MiningSupervisor, SupervisorConfig};
