// src/config/mod.rs
//! Configuration management for the TestORE miner
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Generating configuration templates
//! - Loading the wallet keypair
//!
//! The configuration uses TOML format. Every key is optional except
//! `program_id`.

/// Core configuration implementation
///
/// Contains the [`Config`] struct that defines the miner's configuration
/// structure and behavior.
pub mod config;

/// Keypair file handling
pub mod wallet;

// Re-export key items for easy access
pub use config::{Config, DEFAULT_CONFIG_FILE};
pub use wallet::{expand_home, load_keypair};

/// Generates a commented configuration template
pub fn generate_template() -> String {
    Config::generate_template()
}
