//! Wiki editor augmentation: sidebar fetch and page-name helpers.
//!
//! When a wiki "new page" or "edit page" form is open, the wiki's sidebar is
//! pulled from the wiki home page and shown next to the editor. Clicking one
//! of its links pre-fills the page-name field instead of navigating.
//!
//! This crate provides:
//! - [`wiki_base_url`]: home page URL derived from an editor URL
//! - [`SidebarClient`]: fetch + extract of the sidebar fragment
//! - [`wrap_sidebar`] / [`display_name`]: markup and naming helpers

use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use diagramlens_shared::{DiagramLensError, Result};

/// Path marker the base URL is cut at.
const WIKI_MARKER: &str = "/wiki/";

/// Location of the sidebar fragment in the fetched wiki page.
pub const SIDEBAR_SELECTOR: &str = ".wiki-rightbar > .gollum-markdown-content";

/// Class of the injected sidebar wrapper.
pub const SIDEBAR_CLASS: &str = "sidebar";

/// Form field that receives the page name on link click.
pub const PAGE_NAME_FIELD: &str = r#"input[name="wiki[name]"]"#;

/// Written after the page name. U+A789 MODIFIER LETTER COLON, not `:`,
/// which page names may not contain.
pub const NAME_SEPARATOR: &str = "\u{a789} ";

/// User-Agent string for sidebar requests.
const USER_AGENT: &str = concat!("diagramlens/", env!("CARGO_PKG_VERSION"));

/// Truncate an editor URL right after its `/wiki` segment.
///
/// `https://github.com/o/r/wiki/_new` → `https://github.com/o/r/wiki`.
pub fn wiki_base_url(page_url: &str) -> Result<String> {
    let index = page_url.find(WIKI_MARKER).ok_or_else(|| {
        DiagramLensError::Augment(format!("no `{WIKI_MARKER}` segment in {page_url}"))
    })?;
    Ok(page_url[..index + WIKI_MARKER.len() - 1].to_string())
}

/// Wrap sidebar markup for injection at the start of the editor.
pub fn wrap_sidebar(inner_html: &str) -> String {
    format!(r#"<div class="{SIDEBAR_CLASS}" style="float:left; margin:10px">{inner_html}</div>"#)
}

/// Page name for a sidebar link: last path segment, percent-decoded, with
/// hyphens read as spaces.
pub fn display_name(href: &str) -> String {
    let segment = href.rsplit('/').next().unwrap_or(href);
    percent_decode_str(segment)
        .decode_utf8_lossy()
        .replace('-', " ")
}

/// Resolve a link's `href` the way the browser's `a.href` does.
pub fn resolve_href(page_url: &str, href: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Inner HTML of the sidebar fragment, or `None` when the page has none.
pub fn extract_sidebar(html: &str) -> Result<Option<String>> {
    let selector = Selector::parse(SIDEBAR_SELECTOR)
        .map_err(|e| DiagramLensError::Selector(format!("{SIDEBAR_SELECTOR}: {e}")))?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&selector).next().map(|el| el.inner_html()))
}

// ---------------------------------------------------------------------------
// SidebarClient
// ---------------------------------------------------------------------------

/// HTTP client for the wiki home page.
#[derive(Debug, Clone)]
pub struct SidebarClient {
    client: Client,
}

impl SidebarClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| DiagramLensError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and extract the sidebar fragment. No retry.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_sidebar(&self, url: &str) -> Result<Option<String>> {
        debug!("fetching wiki sidebar");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DiagramLensError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiagramLensError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DiagramLensError::Network(format!("{url}: body read failed: {e}")))?;

        extract_sidebar(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIKI_HOME: &str = r#"<html><body>
        <div class="wiki-rightbar">
          <div class="gollum-markdown-content"><ul>
            <li><a href="/o/r/wiki/Getting-Started">Getting Started</a></li>
            <li><a href="/o/r/wiki/Caf%C3%A9-Notes">Café Notes</a></li>
          </ul></div>
        </div>
    </body></html>"#;

    #[test]
    fn base_url_cuts_after_wiki() {
        assert_eq!(
            wiki_base_url("https://github.com/o/r/wiki/_new").unwrap(),
            "https://github.com/o/r/wiki"
        );
        assert_eq!(
            wiki_base_url("https://github.com/o/r/wiki/Home/_edit").unwrap(),
            "https://github.com/o/r/wiki"
        );
        assert!(wiki_base_url("https://github.com/o/r/issues/new").is_err());
    }

    #[test]
    fn display_name_decodes_and_unhyphenates() {
        assert_eq!(display_name("https://github.com/o/r/wiki/Getting-Started"), "Getting Started");
        assert_eq!(display_name("https://github.com/o/r/wiki/Caf%C3%A9-Notes"), "Café Notes");
        assert_eq!(display_name("Plain"), "Plain");
    }

    #[test]
    fn resolves_relative_hrefs_against_page() {
        assert_eq!(
            resolve_href("https://github.com/o/r/wiki/_new", "/o/r/wiki/Setup"),
            "https://github.com/o/r/wiki/Setup"
        );
    }

    #[test]
    fn extracts_fragment_or_none() {
        let inner = extract_sidebar(WIKI_HOME).unwrap().unwrap();
        assert!(inner.contains("Getting Started"));
        assert!(extract_sidebar("<html><body><main></main></body></html>").unwrap().is_none());
    }

    #[test]
    fn wrapper_markup() {
        assert_eq!(
            wrap_sidebar("<p>x</p>"),
            r#"<div class="sidebar" style="float:left; margin:10px"><p>x</p></div>"#
        );
    }

    #[tokio::test]
    async fn fetches_sidebar_from_mock_server() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/o/r/wiki"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(WIKI_HOME))
            .mount(&server)
            .await;

        let client = SidebarClient::new(Duration::from_secs(5)).unwrap();
        let sidebar = client
            .fetch_sidebar(&format!("{}/o/r/wiki", server.uri()))
            .await
            .unwrap();
        assert!(sidebar.unwrap().contains("Café Notes"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SidebarClient::new(Duration::from_secs(5)).unwrap();
        let err = client.fetch_sidebar(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }
}
