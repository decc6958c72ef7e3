//! Page rendering
//!
//! A [`Renderer`] turns one URL into its rendered HTML plus the raw `href`
//! values found on the page. Renderers never touch the page store; persisting
//! is the coordinator's job so either side can be swapped out in tests.
//!
//! Two implementations ship with the crate:
//! - [`ChromiumRenderer`] drives headless Chromium, so client-rendered content
//!   is captured (feature `chromium`, on by default)
//! - [`HttpRenderer`] performs a plain HTTP GET

#[cfg(feature = "chromium")]
mod chromium;
mod http;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumRenderer;
pub use http::{build_http_client, HttpRenderer};

use crate::config::{RendererConfig, RendererKind};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A successfully rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the renderer settled on after redirects
    pub final_url: Url,
    /// HTTP status of the main document
    pub status: u16,
    /// Serialized DOM (or response body for the HTTP renderer)
    pub html: String,
    /// Raw `href` values of the page's anchors, unresolved
    pub links: Vec<String>,
}

/// Failure to render a single page
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Request timeout for {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Expected HTML from {url}, got {content_type}")]
    NotHtml { url: String, content_type: String },

    #[error("Browser error for {url}: {message}")]
    Browser { url: String, message: String },

    #[error("Failed to start renderer: {0}")]
    Launch(String),
}

impl RenderError {
    /// Returns true for failures worth retrying: timeouts, network errors,
    /// HTTP 429 and 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotHtml { .. } | Self::Browser { .. } | Self::Launch(_) => false,
        }
    }
}

/// Statuses treated as a successful page load
pub fn is_success_status(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Renders a single URL
///
/// Implementations must bound the whole operation by `timeout` and report
/// every per-page problem as a [`RenderError`] rather than panicking.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> impl Future<Output = Result<RenderedPage, RenderError>> + Send;
}

impl<R: Renderer> Renderer for Arc<R> {
    fn render(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> impl Future<Output = Result<RenderedPage, RenderError>> + Send {
        (**self).render(url, timeout)
    }
}

/// Renderer selected at runtime from [`RendererConfig::kind`]
pub enum ConfiguredRenderer {
    Http(HttpRenderer),
    #[cfg(feature = "chromium")]
    Chromium(ChromiumRenderer),
}

impl ConfiguredRenderer {
    /// Builds the configured renderer
    ///
    /// Launch failures are fatal for the crawl that needed the renderer.
    pub async fn from_config(config: &RendererConfig) -> Result<Self, RenderError> {
        match config.kind {
            RendererKind::Http => Ok(Self::Http(HttpRenderer::new(config)?)),
            #[cfg(feature = "chromium")]
            RendererKind::Chromium => Ok(Self::Chromium(ChromiumRenderer::launch(config).await?)),
            #[cfg(not(feature = "chromium"))]
            RendererKind::Chromium => Err(RenderError::Launch(
                "hopcrawl was built without the `chromium` feature".to_string(),
            )),
        }
    }

    /// Releases browser resources, if any
    pub async fn shutdown(self) {
        match self {
            Self::Http(_) => {}
            #[cfg(feature = "chromium")]
            Self::Chromium(renderer) => renderer.close().await,
        }
    }
}

impl Renderer for ConfiguredRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        match self {
            Self::Http(renderer) => renderer.render(url, timeout).await,
            #[cfg(feature = "chromium")]
            Self::Chromium(renderer) => renderer.render(url, timeout).await,
        }
    }
}
