//! Configuration module for plex-transcode
//!
//! Handles loading run configuration from TOML files and environment variable overrides.

pub mod config;

pub use config::*;
