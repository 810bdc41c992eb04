//! HTML serialization through html5ever.
//!
//! Walks the tree the way `scraper`'s own serializer does, plus one rule it
//! leaves out: the parser drops a newline directly after `<pre>`, `<textarea>`
//! and `<listing>`, so one is written back when the content starts with a
//! newline. Without it a round trip loses the first line of such blocks.

use std::io;

use ego_tree::NodeRef;
use ego_tree::iter::Edge;
use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};
use html5ever::{QualName, namespace_url, ns};
use scraper::{Html, Node};

struct Subtree<'a>(NodeRef<'a, Node>);

impl Serialize for Subtree<'_> {
    fn serialize<S: Serializer>(
        &self,
        serializer: &mut S,
        traversal_scope: TraversalScope,
    ) -> io::Result<()> {
        let skip_self = matches!(traversal_scope, TraversalScope::ChildrenOnly(_));
        for edge in self.0.traverse() {
            match edge {
                Edge::Open(node) => {
                    if skip_self && node == self.0 {
                        continue;
                    }
                    match node.value() {
                        Node::Doctype(doctype) => serializer.write_doctype(doctype.name())?,
                        Node::Comment(comment) => serializer.write_comment(comment)?,
                        Node::Text(text) => serializer.write_text(text)?,
                        Node::Element(element) => {
                            let attrs = element.attrs.iter().map(|(name, value)| (name, &value[..]));
                            serializer.start_elem(element.name.clone(), attrs)?;
                            if drops_leading_newline(node) {
                                serializer.write_text("\n")?;
                            }
                        }
                        Node::ProcessingInstruction(pi) => {
                            serializer.write_processing_instruction(&pi.target, &pi.data)?
                        }
                        Node::Document | Node::Fragment => {}
                    }
                }
                Edge::Close(node) => {
                    if skip_self && node == self.0 {
                        continue;
                    }
                    if let Some(element) = node.value().as_element() {
                        serializer.end_elem(element.name.clone())?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn drops_leading_newline(node: NodeRef<'_, Node>) -> bool {
    let Some(element) = node.value().as_element() else {
        return false;
    };
    element.name.ns == ns!(html)
        && matches!(element.name(), "pre" | "textarea" | "listing")
        && node
            .first_child()
            .and_then(|child| child.value().as_text())
            .is_some_and(|text| text.starts_with('\n'))
}

fn write(node: NodeRef<'_, Node>, traversal_scope: TraversalScope) -> String {
    let opts = SerializeOpts {
        scripting_enabled: false,
        traversal_scope,
        create_missing_parent: false,
    };
    let mut buf = Vec::new();
    // Writes into a Vec do not fail.
    let _ = serialize(&mut buf, &Subtree(node), opts);
    String::from_utf8_lossy(&buf).into_owned()
}

/// `node` and its subtree.
pub(crate) fn outer_html(node: NodeRef<'_, Node>) -> String {
    write(node, TraversalScope::IncludeNode)
}

/// The children of `node`. Elements pass their own name so raw-text content
/// (`<script>`, `<style>`) is written unescaped.
pub(crate) fn inner_html(node: NodeRef<'_, Node>) -> String {
    let context: Option<QualName> = node.value().as_element().map(|e| e.name.clone());
    write(node, TraversalScope::ChildrenOnly(context))
}

/// `html` parsed as a body fragment and written back out.
pub(crate) fn normalize_fragment(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    // html5ever wraps fragment content in a synthetic <html> element.
    match fragment.tree.root().first_child() {
        Some(wrapper) if wrapper.value().is_element() => inner_html(wrapper),
        _ => inner_html(fragment.tree.root()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, Selector};

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = Document::parse(r#"<html><body><p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p></body></html>"#);
        assert!(doc
            .to_html()
            .contains(r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p>"#));
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        let doc = Document::parse(r#"<html><body><input name="wiki[name]"><br></body></html>"#);
        let html = doc.to_html();
        assert!(html.contains(r#"<input name="wiki[name]"><br>"#));
        assert!(!html.contains("</input>"));
    }

    #[test]
    fn pre_keeps_leading_blank_line_across_round_trip() {
        let doc = Document::parse("<html><body><pre>\n\ngraph TD</pre></body></html>");
        let pre = doc.select_first(&sel("pre")).unwrap();
        assert_eq!(doc.text_content(pre), "\ngraph TD");

        let reparsed = Document::parse(&doc.to_html());
        let pre = reparsed.select_first(&sel("pre")).unwrap();
        assert_eq!(reparsed.text_content(pre), "\ngraph TD");
        assert_eq!(reparsed.to_html(), doc.to_html());
    }

    #[test]
    fn svg_keeps_namespaced_and_camel_case_attributes() {
        let mut doc = Document::parse(r#"<html><body><div id="mermaid__a"></div></body></html>"#);
        let container = doc.element_by_id("mermaid__a").unwrap();
        doc.set_inner_html(
            container,
            r##"<svg xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 1 1"><use xlink:href="#a"></use></svg>"##,
        )
        .unwrap();

        let html = doc.inner_html(container);
        assert!(html.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#), "{html}");
        assert!(html.contains(r#"viewBox="0 0 1 1""#), "{html}");
        assert!(html.contains(r##"<use xlink:href="#a">"##), "{html}");

        let reparsed = Document::parse(&doc.to_html());
        assert_eq!(reparsed.to_html(), doc.to_html());
    }

    #[test]
    fn normalized_fragment_matches_inner_html() {
        let mut doc = Document::parse(r#"<html><body><div id="c"></div></body></html>"#);
        let container = doc.element_by_id("c").unwrap();
        let markup = r#"<svg viewBox="0 0 2 2"><path d="M0 0"/></svg>"#;
        doc.set_inner_html(container, markup).unwrap();
        assert_eq!(doc.inner_html(container), super::normalize_fragment(markup));
    }
}
