//! Process-wide entry point: load sweep, late-insertion signals and the
//! cooperative event loop.
//!
//! All document work happens inside [`PageRuntime`] methods, one event at a
//! time. Engine renders and sidebar fetches run as tasks in a `JoinSet`;
//! completions are applied in arrival order, which is unrelated to the order
//! the work was started in. A task that panics is logged and dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use diagramlens_augment::SidebarClient;
use diagramlens_dom::{Document, NodeId, Notification, ObserveOptions, ObserverId};
use diagramlens_render::{RenderEngine, engine_from_config};
use diagramlens_shared::{AppConfig, InsertionSignalKind, Result};

use crate::augment::{DefaultAction, SidebarCompletion};
use crate::dispatcher::Task;
use crate::ids::{IdGenerator, RandomIds};
use crate::pipeline::Pipeline;
use crate::render::RenderCompletion;
use crate::rules::RuleRegistry;

/// Upper bound on observer delivery rounds per flush.
const MAX_DELIVERY_ROUNDS: usize = 64;

/// A host-page event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    AnimationStart { target: NodeId, animation_name: String },
    Click { target: NodeId },
}

// ---------------------------------------------------------------------------
// Late-insertion strategies
// ---------------------------------------------------------------------------

/// How elements inserted after load reach the pipeline.
pub trait LateInsertion: Send {
    fn name(&self) -> &'static str;

    /// Called once, after the load sweep.
    fn install(&mut self, _document: &mut Document) {}

    /// Element signalled by a host event, if this strategy listens for it.
    fn on_event(&self, _event: &HostEvent) -> Option<NodeId> {
        None
    }

    /// Elements signalled by a mutation batch. `None` when the batch belongs
    /// to some other observer.
    fn on_notification(
        &self,
        _document: &Document,
        _registry: &RuleRegistry,
        _notification: &Notification,
    ) -> Option<Vec<NodeId>> {
        None
    }

    /// Events the host fires when the page is first painted.
    fn first_paint(&self, _document: &Document, _registry: &RuleRegistry) -> Vec<HostEvent> {
        Vec::new()
    }
}

/// A named CSS animation started on every rule parent when it is rendered.
#[derive(Debug, Clone)]
pub struct AnimationSignal {
    name: String,
}

impl AnimationSignal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LateInsertion for AnimationSignal {
    fn name(&self) -> &'static str {
        "animation"
    }

    fn on_event(&self, event: &HostEvent) -> Option<NodeId> {
        match event {
            HostEvent::AnimationStart {
                target,
                animation_name,
            } if *animation_name == self.name => Some(*target),
            _ => None,
        }
    }

    fn first_paint(&self, document: &Document, registry: &RuleRegistry) -> Vec<HostEvent> {
        document
            .descendants(document.root())
            .into_iter()
            .filter(|node| {
                registry
                    .iter()
                    .any(|rule| document.matches(*node, &rule.parent_selector))
            })
            .map(|target| HostEvent::AnimationStart {
                target,
                animation_name: self.name.clone(),
            })
            .collect()
    }
}

/// A mutation observer on the document root offering inserted elements that
/// match any rule's parent selector.
#[derive(Debug, Default)]
pub struct DocumentObserverSignal {
    observer: Option<ObserverId>,
}

impl DocumentObserverSignal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LateInsertion for DocumentObserverSignal {
    fn name(&self) -> &'static str {
        "document-observer"
    }

    fn install(&mut self, document: &mut Document) {
        let root = document.root();
        self.observer = Some(document.observe(root, ObserveOptions::insertions()));
    }

    fn on_notification(
        &self,
        document: &Document,
        registry: &RuleRegistry,
        notification: &Notification,
    ) -> Option<Vec<NodeId>> {
        if self.observer != Some(notification.observer) {
            return None;
        }

        let mut seen = HashSet::new();
        let candidates = notification
            .added_nodes()
            .filter(|node| document.is_connected(*node))
            .flat_map(|node| std::iter::once(node).chain(document.descendants(node)))
            .filter(|node| {
                registry
                    .iter()
                    .any(|rule| document.matches(*node, &rule.parent_selector))
            })
            .filter(|node| seen.insert(*node))
            .collect();
        Some(candidates)
    }
}

/// Strategy selected by configuration.
pub fn signal_from_config(config: &AppConfig) -> Box<dyn LateInsertion> {
    match config.pipeline.insertion_signal {
        InsertionSignalKind::Animation => {
            Box::new(AnimationSignal::new(config.pipeline.animation_name.clone()))
        }
        InsertionSignalKind::DocumentObserver => Box::new(DocumentObserverSignal::new()),
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

enum Completion {
    Render(RenderCompletion),
    Sidebar(SidebarCompletion),
}

/// One loaded page and its event loop.
///
/// Methods that can start renders or fetches spawn Tokio tasks and must be
/// called from within a Tokio runtime.
pub struct PageRuntime {
    pipeline: Pipeline,
    signal: Box<dyn LateInsertion>,
    client: SidebarClient,
    tasks: JoinSet<Completion>,
}

impl PageRuntime {
    pub fn new(pipeline: Pipeline, signal: Box<dyn LateInsertion>, client: SidebarClient) -> Self {
        Self {
            pipeline,
            signal,
            client,
            tasks: JoinSet::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn document(&self) -> &Document {
        self.pipeline.document()
    }

    /// Host-side access to the page. Call [`flush`](Self::flush) afterwards to
    /// deliver the resulting mutation records.
    pub fn document_mut(&mut self) -> &mut Document {
        self.pipeline.document_mut()
    }

    pub fn into_document(self) -> Document {
        self.pipeline.into_document()
    }

    /// Renders and fetches started but not yet applied.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Page load: sweep every rule, then start listening for late insertions.
    pub fn load(&mut self) {
        let tasks = self.pipeline.sweep();
        self.spawn(tasks);
        self.signal.install(self.pipeline.document_mut());
        debug!(signal = self.signal.name(), "late-insertion signal installed");
        self.flush();
    }

    /// Deliver a host event.
    pub fn handle(&mut self, event: HostEvent) -> DefaultAction {
        let action = match &event {
            HostEvent::Click { target } => self.pipeline.click(*target),
            HostEvent::AnimationStart { .. } => {
                match self.signal.on_event(&event) {
                    Some(target) => {
                        let tasks = self.pipeline.process_element(target);
                        self.spawn(tasks);
                    }
                    None => debug!(?event, "event ignored"),
                }
                DefaultAction::Allow
            }
        };
        self.flush();
        action
    }

    /// Fire the events a first paint would produce.
    pub fn paint(&mut self) {
        let events = self
            .signal
            .first_paint(self.pipeline.document(), self.pipeline.registry());
        debug!(events = events.len(), "first paint");
        for event in events {
            self.handle(event);
        }
    }

    /// Deliver queued mutation records until the document is quiet.
    pub fn flush(&mut self) {
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let notifications = self.pipeline.document_mut().take_notifications();
            if notifications.is_empty() {
                return;
            }
            for notification in notifications {
                self.deliver(&notification);
            }
        }
        warn!(
            rounds = MAX_DELIVERY_ROUNDS,
            "mutation delivery did not settle, dropping remaining records"
        );
        self.pipeline.document_mut().take_notifications();
    }

    fn deliver(&mut self, notification: &Notification) {
        if let Some(parent) = self.pipeline.watchers().parent_of(notification.observer) {
            self.pipeline.watchers_mut().mark_stale(parent);
            debug!(%parent, records = notification.records.len(), "watched source changed");
            let tasks = self.pipeline.process_element(parent);
            self.spawn(tasks);
            return;
        }

        let candidates = self.signal.on_notification(
            self.pipeline.document(),
            self.pipeline.registry(),
            notification,
        );
        for target in candidates.unwrap_or_default() {
            let tasks = self.pipeline.process_element(target);
            self.spawn(tasks);
        }
    }

    fn spawn(&mut self, tasks: Vec<Task>) {
        for task in tasks {
            match task {
                Task::Render(job) => {
                    self.tasks
                        .spawn(async move { Completion::Render(job.run().await) });
                }
                Task::FetchSidebar(job) => {
                    let client = self.client.clone();
                    self.tasks
                        .spawn(async move { Completion::Sidebar(job.run(client).await) });
                }
            }
        }
    }

    /// Apply the next completion. Returns `false` once nothing is in flight.
    pub async fn next_completion(&mut self) -> bool {
        let completion = match self.tasks.join_next().await {
            None => return false,
            Some(Ok(completion)) => completion,
            Some(Err(e)) => {
                // The parent keeps its last good content and is retried on
                // its next change.
                warn!(error = %e, "render or fetch task failed");
                return true;
            }
        };

        match completion {
            Completion::Render(done) => self.pipeline.finish_render(done),
            Completion::Sidebar(done) => self.pipeline.finish_sidebar(done),
        }
        self.flush();
        true
    }

    /// Run until every render and fetch, including ones started by their
    /// completions, has been applied.
    #[instrument(skip_all, fields(url = %self.pipeline.page_url()))]
    pub async fn settle(&mut self) {
        let mut applied = 0usize;
        while self.next_completion().await {
            applied += 1;
        }
        info!(applied, "page settled");
    }
}

/// Build a runtime for `html` loaded at `page_url`, engine and signal from
/// configuration.
pub fn open_page(config: &AppConfig, page_url: &str, html: &str) -> Result<PageRuntime> {
    let engine = engine_from_config(&config.engine)?;
    open_page_with(config, page_url, html, engine, Box::new(RandomIds))
}

/// Like [`open_page`] with an explicit engine and id source.
pub fn open_page_with(
    config: &AppConfig,
    page_url: &str,
    html: &str,
    engine: Arc<dyn RenderEngine>,
    ids: Box<dyn IdGenerator>,
) -> Result<PageRuntime> {
    let pipeline = Pipeline::open(config, page_url, html, engine, ids)?;
    let client = SidebarClient::new(Duration::from_secs(config.augment.timeout_secs))?;
    info!(url = page_url, rules = pipeline.registry().len(), "page opened");
    Ok(PageRuntime::new(pipeline, signal_from_config(config), client))
}
