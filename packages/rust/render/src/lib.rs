//! Diagram engines and theme resolution.
//!
//! This crate provides:
//! - [`theme`]: page theme attributes → dark/light preamble
//! - [`RenderEngine`]: the asynchronous engine boundary
//! - [`KrokiEngine`] / [`PassthroughEngine`]: built-in engines

pub mod engine;
mod kroki;
mod passthrough;
pub mod theme;

use std::sync::Arc;
use std::time::Duration;

use diagramlens_shared::{EngineConfig, EngineKind, Result};

pub use engine::{RenderEngine, RenderFuture, RenderRequest};
pub use kroki::KrokiEngine;
pub use passthrough::PassthroughEngine;
pub use theme::{DARK_PREAMBLE, Theme, ThemeAttributes};

/// Build the engine selected by `config`.
pub fn engine_from_config(config: &EngineConfig) -> Result<Arc<dyn RenderEngine>> {
    Ok(match config.kind {
        EngineKind::Kroki => Arc::new(KrokiEngine::new(
            &config.kroki_url,
            Duration::from_secs(config.timeout_secs),
        )?),
        EngineKind::Passthrough => Arc::new(PassthroughEngine),
    })
}
