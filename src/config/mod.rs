//! Configuration module for Sounding
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sounding::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will start at depth ceiling: {}", config.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, OutputFormat};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
