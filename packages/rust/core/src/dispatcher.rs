//! Routes matched pairs to their handlers and retires superseded source.
//!
//! The dispatcher owns the page state that handlers mutate: the document, the
//! render adapter, the augmenter and the watcher registry. Handlers that start
//! asynchronous work hand back a [`Task`] for the event loop to drive.

use tracing::debug;

use diagramlens_dom::{Document, NodeId};

use crate::augment::{DefaultAction, PageAugmenter, SidebarCompletion, SidebarJob};
use crate::matcher::{self, MatchedPair};
use crate::render::{RenderAdapter, RenderCompletion, RenderJob};
use crate::rules::{Handler, Rule};
use crate::watcher::WatcherRegistry;

/// Asynchronous work started by a handler.
#[derive(Debug)]
pub enum Task {
    Render(RenderJob),
    FetchSidebar(SidebarJob),
}

pub struct Dispatcher {
    document: Document,
    renderer: RenderAdapter,
    augmenter: PageAugmenter,
    watchers: WatcherRegistry,
    remove_source: bool,
}

impl Dispatcher {
    pub fn new(
        document: Document,
        renderer: RenderAdapter,
        augmenter: PageAugmenter,
        remove_source: bool,
    ) -> Self {
        Self {
            document,
            renderer,
            augmenter,
            watchers: WatcherRegistry::new(),
            remove_source,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    pub fn watchers_mut(&mut self) -> &mut WatcherRegistry {
        &mut self.watchers
    }

    /// Dispatch every current pair of `rule`, parent by parent.
    pub fn run_rule(&mut self, rule: &Rule) -> Vec<Task> {
        let pairs = matcher::pairs(&self.document, rule);
        debug!(rule = %rule.name, pairs = pairs.len(), "sweeping rule");

        let mut tasks = Vec::new();
        for group in pairs.chunk_by(|a, b| a.parent == b.parent) {
            let mut invoked = false;
            for pair in group {
                invoked |= self.dispatch_pair(rule, *pair, &mut tasks);
            }
            if invoked {
                self.remove_superseded(rule);
            }
        }
        tasks
    }

    /// Dispatch the pairs of one parent owned by `rule`.
    pub fn run_parent(&mut self, rule: &Rule, parent: NodeId) -> Vec<Task> {
        let mut tasks = Vec::new();
        if !self.document.is_connected(parent) {
            debug!(%parent, "parent is no longer in the document");
            return tasks;
        }

        let mut invoked = false;
        for pair in matcher::pairs_within(&self.document, rule, parent) {
            invoked |= self.dispatch_pair(rule, pair, &mut tasks);
        }
        if invoked {
            self.remove_superseded(rule);
        }
        tasks
    }

    /// Extract and invoke the handler. Returns whether the handler ran.
    fn dispatch_pair(&mut self, rule: &Rule, pair: MatchedPair, tasks: &mut Vec<Task>) -> bool {
        let text = self.document.text_content(pair.child);
        let Some(code) = rule.extract(&text) else {
            debug!(rule = %rule.name, child = %pair.child, "no diagram in block");
            return false;
        };

        match rule.handler {
            Handler::RenderDiagram => {
                let job = self.renderer.render_diagram(
                    &mut self.document,
                    &mut self.watchers,
                    code,
                    pair.parent,
                );
                tasks.extend(job.map(Task::Render));
            }
            Handler::AugmentPage => {
                tasks.extend(self.augmenter.begin(pair.child).map(Task::FetchSidebar));
            }
        }
        true
    }

    /// Remove the first element matching the rule's parent selector.
    fn remove_superseded(&mut self, rule: &Rule) {
        if !self.remove_source || !rule.handler.supersedes_source() {
            return;
        }
        if let Some(first) = self.document.select_first(&rule.parent_selector) {
            debug!(rule = %rule.name, node = %first, "removing source block");
            self.document.remove(first);
        }
    }

    pub fn finish_render(&mut self, completion: RenderCompletion) {
        self.renderer
            .complete(&mut self.document, &mut self.watchers, completion);
    }

    pub fn finish_sidebar(&mut self, completion: SidebarCompletion) {
        self.augmenter.complete(&mut self.document, completion);
    }

    pub fn click(&mut self, target: NodeId) -> DefaultAction {
        self.augmenter.click(&mut self.document, target)
    }
}
