//! Page transformation pipeline for diagramlens.
//!
//! This crate ties together rule selection, DOM matching, diagram rendering
//! and editor augmentation into a live page runtime:
//! - [`rules`]: per-page rule registry
//! - [`matcher`]: parent/child pair discovery
//! - [`dispatcher`]: handler routing and source retirement
//! - [`render`] / [`augment`]: the two handlers
//! - [`watcher`]: per-parent re-render state machine
//! - [`bridge`]: load sweep, late-insertion signals, event loop

pub mod augment;
pub mod bridge;
pub mod dispatcher;
pub mod ids;
pub mod matcher;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use augment::DefaultAction;
pub use bridge::{
    AnimationSignal, DocumentObserverSignal, HostEvent, LateInsertion, PageRuntime, open_page,
    open_page_with, signal_from_config,
};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use pipeline::{PageOptions, Pipeline};
pub use rules::{Handler, Rule, RuleRegistry};
pub use watcher::WatcherState;
