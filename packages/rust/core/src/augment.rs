//! Sidebar injection into wiki editor pages and the link click intercepts.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use diagramlens_augment::{
    NAME_SEPARATOR, PAGE_NAME_FIELD, SidebarClient, display_name, resolve_href, wiki_base_url,
    wrap_sidebar,
};
use diagramlens_dom::{Document, NodeId, Position, Selector};
use diagramlens_shared::{DiagramLensError, Result};

/// Whether the host should run an event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Allow,
    Prevent,
}

/// A pending sidebar fetch for one editor element.
#[derive(Debug, Clone)]
pub struct SidebarJob {
    pub child: NodeId,
    pub url: String,
}

impl SidebarJob {
    pub async fn run(self, client: SidebarClient) -> SidebarCompletion {
        let result = client.fetch_sidebar(&self.url).await;
        SidebarCompletion {
            child: self.child,
            url: self.url,
            result,
        }
    }
}

#[derive(Debug)]
pub struct SidebarCompletion {
    pub child: NodeId,
    pub url: String,
    pub result: Result<Option<String>>,
}

pub struct PageAugmenter {
    page_url: String,
    link: Selector,
    name_field: Selector,
    augmented: HashSet<NodeId>,
    /// Intercepted link → page name written on click.
    intercepts: HashMap<NodeId, String>,
}

impl PageAugmenter {
    pub fn new(page_url: &str) -> Result<Self> {
        let parse = |source: &str| {
            Selector::parse(source).map_err(|e| DiagramLensError::Selector(e.to_string()))
        };
        Ok(Self {
            page_url: page_url.to_string(),
            link: parse("a")?,
            name_field: parse(PAGE_NAME_FIELD)?,
            augmented: HashSet::new(),
            intercepts: HashMap::new(),
        })
    }

    /// Start augmenting `child`. Each element is augmented at most once.
    pub fn begin(&mut self, child: NodeId) -> Option<SidebarJob> {
        if !self.augmented.insert(child) {
            debug!(%child, "editor already augmented");
            return None;
        }
        match wiki_base_url(&self.page_url) {
            Ok(url) => Some(SidebarJob { child, url }),
            Err(e) => {
                warn!(error = %e, "editor page left unaugmented");
                None
            }
        }
    }

    /// Splice a fetched sidebar into its editor element.
    pub fn complete(&mut self, doc: &mut Document, completion: SidebarCompletion) {
        let fragment = match completion.result {
            Ok(Some(fragment)) => fragment,
            Ok(None) => {
                warn!(url = %completion.url, "wiki page has no sidebar");
                return;
            }
            Err(e) => {
                warn!(url = %completion.url, error = %e, "sidebar fetch failed, editor page left unaugmented");
                return;
            }
        };

        let inserted = match doc.insert_adjacent_html(
            completion.child,
            Position::AfterBegin,
            &wrap_sidebar(&fragment),
        ) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "cannot insert sidebar");
                return;
            }
        };

        let mut links = 0;
        for node in inserted {
            for link in doc.select(node, &self.link) {
                let href = doc.attr(link, "href").unwrap_or_default();
                let name = display_name(&resolve_href(&self.page_url, href));
                self.intercepts.insert(link, name);
                links += 1;
            }
        }
        info!(url = %completion.url, links, "sidebar injected");
    }

    /// Handle a click on `target`. Clicks inside an intercepted link fill the
    /// page-name field and suppress navigation.
    pub fn click(&self, doc: &mut Document, target: NodeId) -> DefaultAction {
        let hit = std::iter::once(target)
            .chain(doc.ancestors(target))
            .find_map(|node| self.intercepts.get(&node));
        let Some(name) = hit else {
            return DefaultAction::Allow;
        };

        match doc.select_first(&self.name_field) {
            Some(field) => {
                let value = format!("{name}{NAME_SEPARATOR}");
                if let Err(e) = doc.set_attr(field, "value", &value) {
                    warn!(error = %e, "cannot write page name");
                } else {
                    debug!(value = %value, "page name filled from sidebar");
                }
            }
            None => warn!("no page-name field on the page"),
        }
        DefaultAction::Prevent
    }

    pub fn is_augmented(&self, child: NodeId) -> bool {
        self.augmented.contains(&child)
    }
}
