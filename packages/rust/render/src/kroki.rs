//! Kroki-backed engine: POST mermaid source, receive SVG.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use diagramlens_shared::{DiagramLensError, Result};

use crate::engine::{RenderEngine, RenderFuture, RenderRequest};

/// User-Agent string for render requests.
const USER_AGENT: &str = concat!("diagramlens/", env!("CARGO_PKG_VERSION"));

/// Renders through a Kroki server's `/mermaid/svg` endpoint.
#[derive(Debug, Clone)]
pub struct KrokiEngine {
    client: Client,
    endpoint: String,
}

impl KrokiEngine {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DiagramLensError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/mermaid/svg", server_url.trim_end_matches('/')),
        })
    }
}

impl RenderEngine for KrokiEngine {
    fn render(&self, request: RenderRequest) -> Result<RenderFuture> {
        if request.source.trim().is_empty() {
            return Err(DiagramLensError::Render("empty diagram source".into()));
        }

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Ok(Box::pin(async move {
            debug!(target_name = %request.target, %endpoint, "requesting render");

            let response = client
                .post(&endpoint)
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(request.source)
                .send()
                .await
                .map_err(|e| DiagramLensError::Network(format!("{endpoint}: {e}")))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| DiagramLensError::Network(format!("{endpoint}: body read failed: {e}")))?;

            if !status.is_success() {
                return Err(DiagramLensError::Render(format!("HTTP {status}: {}", body.trim())));
            }
            Ok(body)
        }))
    }

    fn name(&self) -> &str {
        "kroki"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(source: &str) -> RenderRequest {
        RenderRequest {
            target: "mermaid__a_svg".into(),
            source: source.into(),
        }
    }

    #[tokio::test]
    async fn posts_source_and_returns_svg() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mermaid/svg"))
            .and(body_string("graph TD\nA-->B"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<svg>ok</svg>"))
            .expect(1)
            .mount(&server)
            .await;

        let engine = KrokiEngine::new(&format!("{}/", server.uri()), Duration::from_secs(5)).unwrap();
        let svg = engine.render(request("graph TD\nA-->B")).unwrap().await.unwrap();
        assert_eq!(svg, "<svg>ok</svg>");
    }

    #[tokio::test]
    async fn error_status_is_a_render_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Syntax error in graph"))
            .mount(&server)
            .await;

        let engine = KrokiEngine::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = engine.render(request("graph ???")).unwrap().await.unwrap_err();
        assert!(matches!(err, DiagramLensError::Render(_)));
        assert!(err.to_string().contains("Syntax error in graph"));
    }

    #[test]
    fn empty_source_fails_synchronously() {
        let engine = KrokiEngine::new("https://kroki.io", Duration::from_secs(5)).unwrap();
        assert!(engine.render(request("  \n")).is_err());
    }
}
