//! Finds parent/child pairs for a rule in the live document.
//!
//! Nothing is cached: every call reflects the document as it is now.

use diagramlens_dom::{Document, NodeId};

use crate::rules::{Rule, RuleRegistry};

/// A parent element and one of its matching descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    pub parent: NodeId,
    pub child: NodeId,
}

/// All pairs for `rule`, parents in document order, children in document
/// order within each parent.
pub fn pairs(doc: &Document, rule: &Rule) -> Vec<MatchedPair> {
    doc.select_all(&rule.parent_selector)
        .into_iter()
        .flat_map(|parent| pairs_within(doc, rule, parent))
        .collect()
}

/// Pairs for one parent.
pub fn pairs_within(doc: &Document, rule: &Rule, parent: NodeId) -> Vec<MatchedPair> {
    doc.select(parent, &rule.child_selector)
        .into_iter()
        .map(|child| MatchedPair { parent, child })
        .collect()
}

/// The first rule (in registry order) owning `node`: the rule whose parent
/// selector matches `node` or its nearest matching ancestor.
///
/// Returns the rule and the owning parent element.
pub fn owning_rule<'r>(
    doc: &Document,
    registry: &'r RuleRegistry,
    node: NodeId,
) -> Option<(&'r Rule, NodeId)> {
    if !doc.is_connected(node) {
        return None;
    }
    registry.iter().find_map(|rule| {
        doc.closest(node, &rule.parent_selector)
            .map(|parent| (rule, parent))
    })
}
