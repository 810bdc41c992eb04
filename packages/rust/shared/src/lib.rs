//! Shared types, error model, and configuration for diagramlens.
//!
//! This crate is the foundation depended on by all other diagramlens crates.
//! It provides:
//! - [`DiagramLensError`]: the unified error type
//! - Identifier types ([`StableId`], [`ContainerName`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AugmentConfig, EngineConfig, EngineKind, HandlerKind, InsertionSignalKind,
    PipelineConfig, RuleConfig, ThemeConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{DiagramLensError, Result};
pub use types::{CONTAINER_PREFIX, ContainerName, GENERATED_ID_PREFIX, StableId};
