//! The render engine boundary.

use std::future::Future;
use std::pin::Pin;

use diagramlens_shared::Result;

/// Completion of one render: markup for the container, or the engine's error.
pub type RenderFuture = Pin<Box<dyn Future<Output = Result<String>> + Send + 'static>>;

/// One render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Name of the element the engine should produce (`<container>_svg`).
    pub target: String,
    /// Diagram source, theme preamble included.
    pub source: String,
}

/// An external diagram engine.
///
/// `render` may fail synchronously (the request is rejected outright) or
/// asynchronously through the returned future. Completions of different
/// requests are unordered.
pub trait RenderEngine: Send + Sync {
    fn render(&self, request: RenderRequest) -> Result<RenderFuture>;

    /// Engine name for tracing.
    fn name(&self) -> &str;
}
