//! Per-parent mutation watchers.
//!
//! A watcher is attached the first time a parent gets a render container and
//! re-triggers the dispatcher whenever the parent's text or children change.
//! Its lifecycle is an explicit state machine so it can be driven without a
//! real event loop:
//!
//! ```text
//! Unrendered --render ok--> Rendered --mutation--> Stale --render ok--> Rendered
//! ```

use std::collections::HashMap;

use diagramlens_dom::{NodeId, ObserverId};

/// Watcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Attached, no render has completed yet.
    Unrendered,
    /// Container reflects the latest source.
    Rendered,
    /// Source changed since the last completed render.
    Stale,
}

#[derive(Debug, Clone)]
struct Watcher {
    observer: ObserverId,
    state: WatcherState,
}

/// All watchers of one page, keyed by parent element.
#[derive(Debug, Default)]
pub struct WatcherRegistry {
    by_parent: HashMap<NodeId, Watcher>,
    by_observer: HashMap<ObserverId, NodeId>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a watcher for `parent`. Returns `false` if one already exists.
    pub fn attach(&mut self, parent: NodeId, observer: ObserverId) -> bool {
        if self.by_parent.contains_key(&parent) {
            return false;
        }
        self.by_parent.insert(
            parent,
            Watcher {
                observer,
                state: WatcherState::Unrendered,
            },
        );
        self.by_observer.insert(observer, parent);
        true
    }

    pub fn is_watched(&self, parent: NodeId) -> bool {
        self.by_parent.contains_key(&parent)
    }

    pub fn state(&self, parent: NodeId) -> Option<WatcherState> {
        self.by_parent.get(&parent).map(|w| w.state)
    }

    /// Parent watched by `observer`, if the observer belongs to a watcher.
    pub fn parent_of(&self, observer: ObserverId) -> Option<NodeId> {
        self.by_observer.get(&observer).copied()
    }

    /// An observed mutation: the parent must be processed again.
    pub fn mark_stale(&mut self, parent: NodeId) -> bool {
        match self.by_parent.get_mut(&parent) {
            Some(watcher) => {
                if watcher.state == WatcherState::Rendered {
                    watcher.state = WatcherState::Stale;
                }
                true
            }
            None => false,
        }
    }

    /// A render for `parent` completed and its markup is in the container.
    pub fn mark_rendered(&mut self, parent: NodeId) {
        if let Some(watcher) = self.by_parent.get_mut(&parent) {
            watcher.state = WatcherState::Rendered;
        }
    }

    pub fn len(&self) -> usize {
        self.by_parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_parent.is_empty()
    }
}
