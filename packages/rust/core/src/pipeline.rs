//! The per-page pipeline controller: rules plus the dispatcher state.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use diagramlens_dom::{Document, NodeId};
use diagramlens_render::RenderEngine;
use diagramlens_shared::{AppConfig, Result};

use crate::augment::{DefaultAction, PageAugmenter, SidebarCompletion};
use crate::dispatcher::{Dispatcher, Task};
use crate::ids::IdGenerator;
use crate::matcher;
use crate::render::{RenderAdapter, RenderCompletion};
use crate::rules::RuleRegistry;
use crate::watcher::WatcherRegistry;

/// Settings for one page, usually taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub prefers_dark: bool,
    pub remove_source: bool,
}

impl From<&AppConfig> for PageOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            prefers_dark: config.theme.prefers_dark,
            remove_source: config.pipeline.remove_source,
        }
    }
}

pub struct Pipeline {
    page_url: String,
    registry: RuleRegistry,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(
        page_url: &str,
        registry: RuleRegistry,
        document: Document,
        engine: Arc<dyn RenderEngine>,
        ids: Box<dyn IdGenerator>,
        options: &PageOptions,
    ) -> Result<Self> {
        let renderer = RenderAdapter::new(engine, options.prefers_dark, ids);
        let augmenter = PageAugmenter::new(page_url)?;
        Ok(Self {
            page_url: page_url.to_string(),
            registry,
            dispatcher: Dispatcher::new(document, renderer, augmenter, options.remove_source),
        })
    }

    /// Parse `html` as the page at `page_url`, with the rules that apply to it.
    pub fn open(
        config: &AppConfig,
        page_url: &str,
        html: &str,
        engine: Arc<dyn RenderEngine>,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Self> {
        let registry = RuleRegistry::for_page(page_url, &config.rules)?;
        Self::new(
            page_url,
            registry,
            Document::parse(html),
            engine,
            ids,
            &PageOptions::from(config),
        )
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn document(&self) -> &Document {
        self.dispatcher.document()
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.dispatcher.document_mut()
    }

    pub fn into_document(self) -> Document {
        self.dispatcher.into_document()
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        self.dispatcher.watchers()
    }

    pub fn watchers_mut(&mut self) -> &mut WatcherRegistry {
        self.dispatcher.watchers_mut()
    }

    /// Run every rule over the whole document.
    #[instrument(skip_all, fields(url = %self.page_url))]
    pub fn sweep(&mut self) -> Vec<Task> {
        let mut tasks = Vec::new();
        for rule in &self.registry {
            tasks.extend(self.dispatcher.run_rule(rule));
        }
        info!(
            rules = self.registry.len(),
            tasks = tasks.len(),
            "page sweep complete"
        );
        tasks
    }

    /// Process one element: the first rule whose parent selector matches it
    /// or its nearest ancestor handles that parent only.
    pub fn process_element(&mut self, node: NodeId) -> Vec<Task> {
        match matcher::owning_rule(self.dispatcher.document(), &self.registry, node) {
            Some((rule, parent)) => {
                debug!(rule = %rule.name, %parent, "processing element");
                self.dispatcher.run_parent(rule, parent)
            }
            None => {
                debug!(%node, "no rule owns element");
                Vec::new()
            }
        }
    }

    pub fn finish_render(&mut self, completion: RenderCompletion) {
        self.dispatcher.finish_render(completion);
    }

    pub fn finish_sidebar(&mut self, completion: SidebarCompletion) {
        self.dispatcher.finish_sidebar(completion);
    }

    pub fn click(&mut self, target: NodeId) -> DefaultAction {
        self.dispatcher.click(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::testing::RecordingEngine;

    fn open(html: &str, url: &str, remove_source: bool) -> (Pipeline, RecordingEngine) {
        let engine = RecordingEngine::new();
        let mut config = AppConfig::default();
        config.pipeline.remove_source = remove_source;
        let pipeline = Pipeline::open(
            &config,
            url,
            html,
            Arc::new(engine.clone()),
            Box::new(SequentialIds::new()),
        )
        .unwrap();
        (pipeline, engine)
    }

    const BLOB: &str = r#"<html data-color-mode="light"><body><article>
        <pre lang="mermaid"><code>flowchart TD
A--&gt;B</code></pre>
    </article></body></html>"#;

    #[test]
    fn unmatched_page_is_a_no_op() {
        let (mut pipeline, engine) = open(BLOB, "https://example.org/readme", true);
        let before = pipeline.document().to_html();
        assert!(pipeline.sweep().is_empty());
        assert!(engine.calls().is_empty());
        assert_eq!(pipeline.document().to_html(), before);
    }

    #[test]
    fn process_element_resolves_owner_from_descendant() {
        let (mut pipeline, engine) = open(BLOB, "https://github.com/o/r/blob/main/README.md", false);
        let code = pipeline
            .document()
            .select_first(&"code".parse().unwrap())
            .unwrap();

        let tasks = pipeline.process_element(code);
        assert_eq!(tasks.len(), 1);
        assert_eq!(engine.calls()[0].source, "flowchart TD\nA-->B");
    }

    #[test]
    fn process_element_outside_rules_does_nothing() {
        let (mut pipeline, engine) = open(BLOB, "https://github.com/o/r/blob/main/README.md", true);
        let article = pipeline
            .document()
            .select_first(&"article".parse().unwrap())
            .unwrap();
        assert!(pipeline.process_element(article).is_empty());
        assert!(engine.calls().is_empty());
    }
}
