//! Live, mutable in-memory DOM for the diagramlens pipeline.
//!
//! This crate provides:
//! - [`Document`]: a `scraper::Html` tree edited in place, with stable node ids
//! - [`Selector`]: `scraper` CSS selectors resolved against a live document
//! - [`MutationRecord`] / [`Notification`]: observer bookkeeping modelled on
//!   the browser's `MutationObserver`

pub mod document;
pub mod mutation;
pub mod selector;
mod serialize;

pub use document::{Document, DomError, NodeId, Position};
pub use mutation::{MutationKind, MutationRecord, Notification, ObserveOptions, ObserverId};
pub use selector::{Selector, SelectorError};
