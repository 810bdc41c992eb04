//! Render adapter: stable ids, containers, theme preamble, engine calls.

use std::sync::Arc;

use tracing::{debug, error, warn};

use diagramlens_dom::{Document, NodeId, ObserveOptions};
use diagramlens_render::{RenderEngine, RenderFuture, RenderRequest, Theme, ThemeAttributes};
use diagramlens_shared::{ContainerName, Result, StableId};

use crate::ids::IdGenerator;
use crate::watcher::WatcherRegistry;

/// An engine call in flight for one parent.
pub struct RenderJob {
    pub parent: NodeId,
    pub container: NodeId,
    pub container_name: ContainerName,
    /// Themed source sent to the engine.
    pub source: String,
    future: RenderFuture,
}

impl RenderJob {
    /// Wait for the engine.
    pub async fn run(self) -> RenderCompletion {
        let result = self.future.await;
        RenderCompletion {
            parent: self.parent,
            container: self.container,
            container_name: self.container_name,
            source: self.source,
            result,
        }
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("parent", &self.parent)
            .field("container", &self.container_name)
            .finish_non_exhaustive()
    }
}

/// Engine result for a [`RenderJob`].
#[derive(Debug)]
pub struct RenderCompletion {
    pub parent: NodeId,
    pub container: NodeId,
    pub container_name: ContainerName,
    pub source: String,
    pub result: Result<String>,
}

/// Read the root element's theme attributes. Missing ones are empty.
pub fn theme_attributes(doc: &Document) -> ThemeAttributes {
    let read = |name: &str| {
        doc.document_element()
            .and_then(|root| doc.attr(root, name))
            .unwrap_or_default()
            .to_string()
    };
    ThemeAttributes {
        color_mode: read("data-color-mode"),
        dark_theme: read("data-dark-theme"),
        light_theme: read("data-light-theme"),
    }
}

pub struct RenderAdapter {
    engine: Arc<dyn RenderEngine>,
    prefers_dark: bool,
    ids: Box<dyn IdGenerator>,
}

impl RenderAdapter {
    pub fn new(engine: Arc<dyn RenderEngine>, prefers_dark: bool, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            engine,
            prefers_dark,
            ids,
        }
    }

    /// Prepare the container for `parent` and start rendering `code` into it.
    ///
    /// Returns `None` when the engine rejects the request outright; the
    /// failure is logged and the container keeps its previous content.
    pub fn render_diagram(
        &mut self,
        doc: &mut Document,
        watchers: &mut WatcherRegistry,
        code: &str,
        parent: NodeId,
    ) -> Option<RenderJob> {
        let stable_id = self.stable_id(doc, parent)?;
        let container_name = stable_id.container();

        let container = match doc.element_by_id(container_name.as_str()) {
            Some(existing) => existing,
            None => {
                let created = doc.create_element("div", [("id", container_name.as_str())]);
                if let Err(e) = doc.insert_after(parent, created) {
                    warn!(container = %container_name, error = %e, "cannot place render container");
                    return None;
                }
                if !watchers.is_watched(parent) {
                    let observer = doc.observe(parent, ObserveOptions::content());
                    watchers.attach(parent, observer);
                }
                debug!(container = %container_name, "created render container");
                created
            }
        };

        let theme = Theme::resolve(&theme_attributes(doc), self.prefers_dark);
        let source = theme.apply(code);
        let request = RenderRequest {
            target: container_name.render_target(),
            source: source.clone(),
        };

        match self.engine.render(request) {
            Ok(future) => {
                debug!(
                    engine = self.engine.name(),
                    container = %container_name,
                    theme = theme.name(),
                    "render started"
                );
                Some(RenderJob {
                    parent,
                    container,
                    container_name,
                    source,
                    future,
                })
            }
            Err(e) => {
                error!(
                    engine = self.engine.name(),
                    container = %container_name,
                    code = %source,
                    error = %e,
                    "diagram render failed"
                );
                None
            }
        }
    }

    /// Write a finished render into its container.
    pub fn complete(
        &self,
        doc: &mut Document,
        watchers: &mut WatcherRegistry,
        completion: RenderCompletion,
    ) {
        match completion.result {
            Ok(markup) => {
                // Document nodes are never reclaimed, so an identical re-render
                // leaves the container alone instead of reallocating it.
                if doc.inner_html(completion.container) == Document::normalize_fragment(&markup) {
                    debug!(container = %completion.container_name, "render unchanged");
                } else if let Err(e) = doc.set_inner_html(completion.container, &markup) {
                    warn!(container = %completion.container_name, error = %e, "cannot write render output");
                    return;
                } else {
                    debug!(container = %completion.container_name, bytes = markup.len(), "render written");
                }
                watchers.mark_rendered(completion.parent);
            }
            Err(e) => {
                error!(
                    engine = self.engine.name(),
                    container = %completion.container_name,
                    code = %completion.source,
                    error = %e,
                    "diagram render failed"
                );
            }
        }
    }

    /// The parent's `id`, generating and persisting a unique one if empty.
    fn stable_id(&mut self, doc: &mut Document, parent: NodeId) -> Option<StableId> {
        if let Some(id) = doc.attr(parent, "id").filter(|id| !id.is_empty()) {
            return Some(StableId::new(id));
        }

        let id = loop {
            let candidate = self.ids.next_id();
            if doc.element_by_id(&candidate).is_none() {
                break candidate;
            }
        };
        if let Err(e) = doc.set_attr(parent, "id", &id) {
            warn!(error = %e, "cannot assign id to source block");
            return None;
        }
        debug!(id = %id, "assigned generated id");
        Some(StableId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::testing::RecordingEngine;
    use crate::watcher::WatcherState;
    use diagramlens_render::DARK_PREAMBLE;
    use diagramlens_shared::DiagramLensError;

    fn adapter(engine: &RecordingEngine) -> RenderAdapter {
        RenderAdapter::new(Arc::new(engine.clone()), false, Box::new(SequentialIds::new()))
    }

    fn doc(root_attrs: &str) -> (Document, NodeId) {
        let doc = Document::parse(&format!(
            r#"<html {root_attrs}><body><div class="c"><pre lang="mermaid"><code>graph A</code></pre><p>after</p></div></body></html>"#
        ));
        let pre = doc.select_first(&"pre".parse().unwrap()).unwrap();
        (doc, pre)
    }

    #[tokio::test]
    async fn creates_container_after_parent_and_watcher() {
        let engine = RecordingEngine::new();
        let mut adapter = adapter(&engine);
        let (mut doc, pre) = doc("");
        let mut watchers = WatcherRegistry::new();

        let job = adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        assert_eq!(doc.attr(pre, "id"), Some("idname_1"));
        assert_eq!(job.container_name.as_str(), "mermaid__idname_1");
        assert_eq!(doc.next_sibling(pre), Some(job.container));
        assert_eq!(watchers.state(pre), Some(WatcherState::Unrendered));

        let completion = job.run().await;
        adapter.complete(&mut doc, &mut watchers, completion);
        assert_eq!(watchers.state(pre), Some(WatcherState::Rendered));
        assert!(doc.inner_html(doc.element_by_id("mermaid__idname_1").unwrap()).contains("graph A"));

        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "mermaid__idname_1_svg");
        assert_eq!(calls[0].source, "graph A");
    }

    #[test]
    fn existing_id_is_kept_and_container_reused() {
        let engine = RecordingEngine::new();
        let mut adapter = adapter(&engine);
        let (mut doc, pre) = doc("");
        doc.set_attr(pre, "id", "chart").unwrap();
        let mut watchers = WatcherRegistry::new();

        let first = adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        let second = adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        assert_eq!(first.container, second.container);
        assert_eq!(first.container_name.as_str(), "mermaid__chart");
        assert_eq!(watchers.len(), 1);
        assert_eq!(doc.select_all(&"div[id]".parse().unwrap()).len(), 1);
    }

    #[test]
    fn generated_ids_skip_collisions() {
        let engine = RecordingEngine::new();
        let mut adapter = adapter(&engine);
        let (mut doc, pre) = doc("");
        let taken = doc.create_element("span", [("id", "idname_1")]);
        let body = doc.select_first(&"body".parse().unwrap()).unwrap();
        doc.append_child(body, taken).unwrap();

        let mut watchers = WatcherRegistry::new();
        adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        assert_eq!(doc.attr(pre, "id"), Some("idname_2"));
    }

    #[test]
    fn dark_page_gets_preamble() {
        let engine = RecordingEngine::new();
        let mut adapter = adapter(&engine);
        let (mut doc, pre) = doc(r#"data-color-mode="dark""#);
        let mut watchers = WatcherRegistry::new();

        adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        assert_eq!(engine.calls()[0].source, format!("{DARK_PREAMBLE}graph A"));
    }

    #[test]
    fn auto_mode_follows_preference() {
        let engine = RecordingEngine::new();
        let mut adapter =
            RenderAdapter::new(Arc::new(engine.clone()), true, Box::new(SequentialIds::new()));
        let (mut doc, pre) = doc(
            r#"data-color-mode="auto" data-dark-theme="dark_dimmed" data-light-theme="light""#,
        );
        let mut watchers = WatcherRegistry::new();

        adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        assert!(engine.calls()[0].source.starts_with(DARK_PREAMBLE));
    }

    #[tokio::test]
    async fn failures_keep_last_good_content() {
        let engine = RecordingEngine::new();
        let mut adapter = adapter(&engine);
        let (mut doc, pre) = doc("");
        let mut watchers = WatcherRegistry::new();

        let job = adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        let container = job.container;
        adapter.complete(&mut doc, &mut watchers, job.run().await);
        let good = doc.inner_html(container);

        // asynchronous failure
        engine.fail_next_async();
        let job = adapter.render_diagram(&mut doc, &mut watchers, "graph B", pre).unwrap();
        let completion = job.run().await;
        assert!(matches!(completion.result, Err(DiagramLensError::Render(_))));
        adapter.complete(&mut doc, &mut watchers, completion);
        assert_eq!(doc.inner_html(container), good);

        // synchronous failure
        engine.fail_next_sync();
        assert!(adapter.render_diagram(&mut doc, &mut watchers, "graph C", pre).is_none());
        assert_eq!(doc.inner_html(container), good);
    }

    #[tokio::test]
    async fn identical_rerender_allocates_no_nodes() {
        let engine = RecordingEngine::new();
        let mut adapter = adapter(&engine);
        let (mut doc, pre) = doc("");
        let mut watchers = WatcherRegistry::new();

        let job = adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        let container = job.container;
        adapter.complete(&mut doc, &mut watchers, job.run().await);
        let rendered = doc.inner_html(container);
        let nodes = doc.node_count();

        watchers.mark_stale(pre);
        let job = adapter.render_diagram(&mut doc, &mut watchers, "graph A", pre).unwrap();
        adapter.complete(&mut doc, &mut watchers, job.run().await);
        assert_eq!(engine.calls().len(), 2);
        assert_eq!(doc.node_count(), nodes);
        assert_eq!(doc.inner_html(container), rendered);
        assert_eq!(watchers.state(pre), Some(WatcherState::Rendered));

        let job = adapter.render_diagram(&mut doc, &mut watchers, "graph B", pre).unwrap();
        adapter.complete(&mut doc, &mut watchers, job.run().await);
        assert!(doc.node_count() > nodes);
        assert!(doc.inner_html(container).contains("graph B"));
    }

    #[test]
    fn missing_theme_attributes_read_empty() {
        let doc = Document::parse("<html><body></body></html>");
        assert_eq!(theme_attributes(&doc), ThemeAttributes::default());
    }
}
