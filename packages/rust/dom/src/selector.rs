//! CSS selectors for rule matching.
//!
//! Parsing and matching are `scraper`'s (the `selectors` crate underneath), so
//! rules can use the full selector grammar: combinators, attribute flags,
//! `:not()`, structural pseudo-classes. This wrapper keeps the source text for
//! display and resolves [`NodeId`]s against a live [`Document`].

use std::fmt;

use scraper::ElementRef;

use crate::document::{Document, NodeId};

/// Selector parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector `{selector}`: {message}")]
pub struct SelectorError {
    /// The selector source text.
    pub selector: String,
    /// What went wrong.
    pub message: String,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    inner: scraper::Selector,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let inner = scraper::Selector::parse(source).map_err(|e| SelectorError {
            selector: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            inner,
        })
    }

    /// The source text this selector was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` is an element matching this selector. Detached nodes
    /// match against whatever ancestors they still have.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.element_ref(node)
            .is_some_and(|element| self.matches_element(&element))
    }

    pub(crate) fn matches_element(&self, element: &ElementRef<'_>) -> bool {
        self.inner.matches(element)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
