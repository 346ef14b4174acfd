// src/config/mod.rs

//! Configuration loading and validation for bakedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and resolve its paths (`loader.rs`).
//! - Validate basic invariants like queue size and absolute paths (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIR, SETTINGS_FILE, load_and_validate, load_from_path,
    load_materialized, materialize,
};
pub use model::{
    Config, ExecutorSection, QueueSection, RawConfig, SchedulerSection, SystemSection,
    TasksSection,
};
