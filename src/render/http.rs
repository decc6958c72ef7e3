//! Plain HTTP renderer
//!
//! Fetches the page body with a single GET. No scripts run, so this renderer
//! only sees server-rendered markup; it exists for hosts that need nothing
//! more and for environments without a browser.

use crate::config::RendererConfig;
use crate::crawler::extract_raw_links;
use crate::render::{is_success_status, RenderError, RenderedPage, Renderer};
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirects followed for a single page
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with the configured user agent
///
/// # Example
///
/// ```
/// use hopcrawl::config::RendererConfig;
/// use hopcrawl::render::build_http_client;
///
/// let client = build_http_client(&RendererConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RendererConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Renderer backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self, RenderError> {
        let client = build_http_client(config)
            .map_err(|e| RenderError::Launch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;

        let status = response.status().as_u16();
        if !is_success_status(status) {
            return Err(RenderError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = response.url().clone();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        if let Some(content_type) = content_type {
            if !is_html(&content_type) {
                return Err(RenderError::NotHtml {
                    url: url.to_string(),
                    content_type,
                });
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;
        let links = extract_raw_links(&html);

        Ok(RenderedPage {
            final_url,
            status,
            html,
            links,
        })
    }
}

impl Renderer for HttpRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        // Bounds the body read as well as the request.
        match tokio::time::timeout(timeout, self.fetch(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }
}

fn is_html(content_type: &str) -> bool {
    content_type.starts_with("text/html") || content_type.starts_with("application/xhtml+xml")
}

fn classify_error(url: &Url, timeout: Duration, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else if error.is_connect() {
        RenderError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        RenderError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
