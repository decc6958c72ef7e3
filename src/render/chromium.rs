//! Headless Chromium renderer
//!
//! One browser process is shared by every worker of a crawl; each render opens
//! its own tab and closes it afterwards.

use crate::config::RendererConfig;
use crate::crawler::extract_raw_links;
use crate::render::{is_success_status, RenderError, RenderedPage, Renderer};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

/// Upper bound for closing a tab after a render
const TAB_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Renderer backed by a headless Chromium instance
pub struct ChromiumRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launches the browser
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumRenderer)` - Browser is running and accepting tabs
    /// * `Err(RenderError::Launch)` - No usable browser could be started
    pub async fn launch(config: &RendererConfig) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", config.user_agent));

        if !config.headless {
            builder = builder.with_head();
        }
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder
            .build()
            .map_err(|e| RenderError::Launch(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(format!("Browser launch failed: {e}")))?;

        // The handler drives the DevTools connection and must be polled for
        // the browser to make progress.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!("Launched headless browser");

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Closes the browser and stops its event handler
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Browser close error: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Browser wait error: {}", e);
        }
        self.handler_task.abort();
    }
}

impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        let deadline = Instant::now() + timeout;

        let open_tab = async {
            self.browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Browser {
                    url: url.to_string(),
                    message: format!("Failed to open tab: {e}"),
                })
        };
        let page = before_deadline(deadline, url, timeout, open_tab).await?;

        let outcome = before_deadline(deadline, url, timeout, load_page(&page, url)).await;
        close_tab(page, url);
        outcome
    }
}

/// Runs one step of a render against the deadline shared by all its steps
async fn before_deadline<T, F>(
    deadline: Instant,
    url: &Url,
    timeout: Duration,
    step: F,
) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, RenderError>>,
{
    match tokio::time::timeout_at(deadline, step).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            url: url.to_string(),
            timeout,
        }),
    }
}

/// Closes a tab in the background so the render returns by its deadline
fn close_tab(page: Page, url: &Url) {
    let url = url.to_string();
    tokio::spawn(async move {
        match tokio::time::timeout(TAB_CLOSE_TIMEOUT, page.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Tab close error for {}: {}", url, e),
            Err(_) => tracing::debug!("Tab close for {} timed out", url),
        }
    });
}

/// Navigates a tab to `url` and captures status, DOM and anchors
async fn load_page(page: &Page, url: &Url) -> Result<RenderedPage, RenderError> {
    page.goto(url.as_str())
        .await
        .map_err(|e| RenderError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let navigation = page
        .wait_for_navigation_response()
        .await
        .map_err(|e| RenderError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let status = navigation
        .as_ref()
        .and_then(|request| request.response.as_ref())
        .map(|response| response.status)
        .ok_or_else(|| RenderError::Network {
            url: url.to_string(),
            message: "No response for main document".to_string(),
        })?;
    let status = u16::try_from(status).unwrap_or(0);

    if !is_success_status(status) {
        return Err(RenderError::Status {
            url: url.to_string(),
            status,
        });
    }

    let html = page.content().await.map_err(|e| RenderError::Browser {
        url: url.to_string(),
        message: format!("Failed to read content: {e}"),
    })?;

    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .and_then(|u| Url::parse(&u).ok())
        .unwrap_or_else(|| url.clone());

    // The serialized DOM includes anchors inserted by scripts.
    let links = extract_raw_links(&html);

    Ok(RenderedPage {
        final_url,
        status,
        html,
        links,
    })
}
