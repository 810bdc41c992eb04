//! Engine that defers rendering to mermaid.js running in the viewer.

use std::future;

use diagramlens_shared::{DiagramLensError, Result};

use crate::engine::{RenderEngine, RenderFuture, RenderRequest};

/// Wraps source in `<pre class="mermaid">` for client-side rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEngine;

impl RenderEngine for PassthroughEngine {
    fn render(&self, request: RenderRequest) -> Result<RenderFuture> {
        if request.source.trim().is_empty() {
            return Err(DiagramLensError::Render("empty diagram source".into()));
        }

        let markup = format!(
            r#"<pre class="mermaid" id="{}">{}</pre>"#,
            escape(&request.target),
            escape(&request.source)
        );
        Ok(Box::pin(future::ready(Ok(markup))))
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
