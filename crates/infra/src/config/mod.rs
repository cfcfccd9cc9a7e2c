//! Configuration loading
//!
//! Loads [`rebound_domain::ReboundConfig`] from environment variables and
//! TOML/JSON files.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, load_from_lookup, search_config_paths};
