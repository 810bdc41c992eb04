//! Transformation rules and the per-page rule registry.
//!
//! Rules are chosen once per page from its URL. A page can satisfy several
//! site predicates (a GitHub wiki editor is also a GitHub page), and each
//! contributes its rules independently, in registration order.

use regex::Regex;
use tracing::debug;

use diagramlens_dom::Selector;
use diagramlens_shared::{DiagramLensError, HandlerKind, Result, RuleConfig};

/// What happens to a matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Extract diagram source and render it next to the parent.
    RenderDiagram,
    /// Inject the wiki sidebar into the editor.
    AugmentPage,
}

impl Handler {
    /// Whether handling a parent makes its raw source redundant.
    pub fn supersedes_source(self) -> bool {
        matches!(self, Self::RenderDiagram)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RenderDiagram => "render-diagram",
            Self::AugmentPage => "augment-page",
        }
    }
}

impl From<HandlerKind> for Handler {
    fn from(kind: HandlerKind) -> Self {
        match kind {
            HandlerKind::Render => Self::RenderDiagram,
            HandlerKind::Augment => Self::AugmentPage,
        }
    }
}

/// An immutable transformation rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub parent_selector: Selector,
    pub child_selector: Selector,
    /// Applied to the child's text; group 1 (or the whole match) is the code.
    pub extraction_pattern: Option<Regex>,
    pub handler: Handler,
}

impl Rule {
    pub fn new(
        name: &str,
        parent: &str,
        child: &str,
        pattern: Option<&str>,
        handler: Handler,
    ) -> Result<Self> {
        let selector = |source: &str| {
            Selector::parse(source)
                .map_err(|e| DiagramLensError::Selector(format!("rule `{name}`: {e}")))
        };
        let extraction_pattern = pattern
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    DiagramLensError::validation(format!("rule `{name}`: bad pattern: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            name: name.to_string(),
            parent_selector: selector(parent)?,
            child_selector: selector(child)?,
            extraction_pattern,
            handler,
        })
    }

    /// Extract diagram code from `text`; `None` when the pattern does not
    /// match. Rules without a pattern pass the text through.
    pub fn extract<'t>(&self, text: &'t str) -> Option<&'t str> {
        let Some(pattern) = &self.extraction_pattern else {
            return Some(text);
        };
        let captures = pattern.captures(text)?;
        captures.get(1).or_else(|| captures.get(0)).map(|m| m.as_str())
    }
}

// ---------------------------------------------------------------------------
// Built-in site profiles
// ---------------------------------------------------------------------------

const GITHUB: &str = r"(?i)github\.com";
const GITHUB_WIKI_EDITOR: &str = r"(?i)github\.com.*(_new|_edit)$";
const AZURE_DEVOPS: &str = r"(?i)dev\.azure\.com";

const AZURE_DIAGRAM_PATTERN: &str = r"(?s)^\s*((classDiagram|classDiagram-v2|erDiagram|flowchart|gantt|gannt|gitGraph|journey|graph|pie|requirementDiagram|sequenceDiagram|stateDiagram|stateDiagram-v2) ?.*)$";

fn site_matches(pattern: &str, url: &str) -> Result<bool> {
    Regex::new(pattern)
        .map(|re| re.is_match(url))
        .map_err(|e| DiagramLensError::validation(format!("bad site pattern `{pattern}`: {e}")))
}

fn builtin_rules(url: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    if site_matches(GITHUB, url)? {
        rules.push(Rule::new(
            "github-mermaid",
            r#"[lang="mermaid"]"#,
            "code",
            Some(r"(?s)(.+)"),
            Handler::RenderDiagram,
        )?);
    }

    if site_matches(GITHUB_WIKI_EDITOR, url)? {
        rules.push(Rule::new(
            "github-wiki-editor",
            "main",
            ".repository-content",
            None,
            Handler::AugmentPage,
        )?);
    }

    if site_matches(AZURE_DEVOPS, url)? {
        rules.push(Rule::new(
            "azure-wiki-mermaid",
            "div.markdown-content > pre.hljs",
            "code",
            Some(AZURE_DIAGRAM_PATTERN),
            Handler::RenderDiagram,
        )?);
    }

    Ok(rules)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered, immutable rule list for one page.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    /// Built-in rules for `url`, followed by configured rules whose `site`
    /// pattern matches it.
    pub fn for_page(url: &str, configured: &[RuleConfig]) -> Result<Self> {
        let mut rules = builtin_rules(url)?;

        for entry in configured {
            if site_matches(&entry.site, url)? {
                rules.push(Rule::new(
                    &entry.name,
                    &entry.parent,
                    &entry.child,
                    entry.pattern.as_deref(),
                    entry.handler.into(),
                )?);
            }
        }

        debug!(url, rules = rules.len(), "selected rules for page");
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

impl<'a> IntoIterator for &'a RuleRegistry {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(registry: &RuleRegistry) -> Vec<&str> {
        registry.iter().map(|rule| rule.name.as_str()).collect()
    }

    #[test]
    fn github_blob_page() {
        let registry =
            RuleRegistry::for_page("https://github.com/o/r/blob/main/README.md", &[]).unwrap();
        assert_eq!(names(&registry), vec!["github-mermaid"]);
    }

    #[test]
    fn github_wiki_editor_gets_both_rules_in_order() {
        let registry = RuleRegistry::for_page("https://github.com/o/r/wiki/_new", &[]).unwrap();
        assert_eq!(names(&registry), vec!["github-mermaid", "github-wiki-editor"]);
        assert_eq!(registry.get("github-wiki-editor").unwrap().handler, Handler::AugmentPage);
    }

    #[test]
    fn azure_devops_wiki() {
        let registry =
            RuleRegistry::for_page("https://dev.azure.com/org/project/_wiki/wikis/x", &[]).unwrap();
        assert_eq!(names(&registry), vec!["azure-wiki-mermaid"]);
    }

    #[test]
    fn unknown_site_is_empty() {
        let registry = RuleRegistry::for_page("https://example.org/docs", &[]).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn configured_rules_follow_builtins() {
        let configured = vec![RuleConfig {
            name: "custom".into(),
            site: r"github\.com/o/".into(),
            parent: "pre.diagram".into(),
            child: "code".into(),
            pattern: None,
            handler: HandlerKind::Render,
        }];
        let registry =
            RuleRegistry::for_page("https://github.com/o/r/blob/main/x.md", &configured).unwrap();
        assert_eq!(names(&registry), vec!["github-mermaid", "custom"]);

        let other = RuleRegistry::for_page("https://github.com/z/r", &configured).unwrap();
        assert_eq!(names(&other), vec!["github-mermaid"]);
    }

    #[test]
    fn invalid_configured_rule_is_an_error() {
        let configured = vec![RuleConfig {
            name: "broken".into(),
            site: ".*".into(),
            parent: "div >".into(),
            child: "code".into(),
            pattern: None,
            handler: HandlerKind::Render,
        }];
        let err = RuleRegistry::for_page("https://example.org", &configured).unwrap_err();
        assert!(matches!(err, DiagramLensError::Selector(_)));
    }

    #[test]
    fn azure_pattern_gates_non_diagrams() {
        let registry =
            RuleRegistry::for_page("https://dev.azure.com/org/p/_wiki", &[]).unwrap();
        let rule = registry.get("azure-wiki-mermaid").unwrap();

        assert_eq!(
            rule.extract("  sequenceDiagram\n  A->>B: hi"),
            Some("sequenceDiagram\n  A->>B: hi")
        );
        assert_eq!(rule.extract("fn main() {}"), None);
    }

    #[test]
    fn azure_pattern_accepts_both_gantt_spellings() {
        let registry =
            RuleRegistry::for_page("https://dev.azure.com/org/p/_wiki", &[]).unwrap();
        let rule = registry.get("azure-wiki-mermaid").unwrap();

        assert_eq!(rule.extract("gantt\n  title Plan"), Some("gantt\n  title Plan"));
        assert_eq!(rule.extract("gannt\n  title Plan"), Some("gannt\n  title Plan"));
        assert_eq!(rule.extract("gant\n  title Plan"), None);
    }

    #[test]
    fn github_pattern_takes_everything_nonempty() {
        let registry = RuleRegistry::for_page("https://github.com/o/r", &[]).unwrap();
        let rule = registry.get("github-mermaid").unwrap();
        assert_eq!(rule.extract("flowchart TD\nA-->B"), Some("flowchart TD\nA-->B"));
        assert_eq!(rule.extract(""), None);
    }
}
