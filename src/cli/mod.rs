// src/cli/mod.rs
//! Command-line interface definitions

/// Argument definitions and config overrides
pub mod commands;

pub use commands::{
    Action, AirdropOptions, Commands, ConfigOptions, LeaderboardOptions, MineOptions,
};
