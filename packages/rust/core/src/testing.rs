//! Test doubles shared by the unit tests.

use std::future;
use std::task::Poll;
use std::sync::{Arc, Mutex};

use diagramlens_render::{RenderEngine, RenderFuture, RenderRequest};
use diagramlens_shared::{DiagramLensError, Result};

#[derive(Debug, Default)]
struct State {
    calls: Vec<RenderRequest>,
    fail_sync: bool,
    fail_async: bool,
    panic_async: bool,
}

/// Records every request and answers with `<svg id=target><text>source</text></svg>`.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    state: Arc<Mutex<State>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fail_next_sync(&self) {
        self.state.lock().unwrap().fail_sync = true;
    }

    pub fn fail_next_async(&self) {
        self.state.lock().unwrap().fail_async = true;
    }

    /// The next render future panics when polled.
    pub fn panic_next_async(&self) {
        self.state.lock().unwrap().panic_async = true;
    }
}

impl RenderEngine for RecordingEngine {
    fn render(&self, request: RenderRequest) -> Result<RenderFuture> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_sync) {
            return Err(DiagramLensError::Render("parse error on line 1".into()));
        }
        state.calls.push(request.clone());

        if std::mem::take(&mut state.panic_async) {
            return Ok(Box::pin(future::poll_fn(|_| -> Poll<Result<String>> {
                panic!("engine crashed")
            })));
        }
        if std::mem::take(&mut state.fail_async) {
            return Ok(Box::pin(future::ready(Err(DiagramLensError::Render(
                "lexical error".into(),
            )))));
        }
        let text = request
            .source
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        let markup = format!(r#"<svg id="{}"><text>{text}</text></svg>"#, request.target);
        Ok(Box::pin(future::ready(Ok(markup))))
    }

    fn name(&self) -> &str {
        "recording"
    }
}
