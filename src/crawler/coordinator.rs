//! Crawler coordinator - main crawl orchestration logic
//!
//! A crawl runs a fixed number of workers over one shared [`Frontier`]:
//! 1. Starter URLs are validated, normalized and admitted at depth 0
//! 2. Each worker leases an entry, renders it and persists the HTML
//! 3. Pages below the hop limit have their links resolved, filtered to the
//!    allowed hosts and admitted through the [`VisitedSet`]
//! 4. The crawl ends when the frontier drains, or early on cancellation or
//!    when the optional crawl timeout elapses
//!
//! A failing page never fails the crawl. It is logged, recorded as a
//! [`CrawlFailure`] and the remaining work carries on.

use crate::config::{validate, Config, CrawlerConfig};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::parser::resolve_links;
use crate::crawler::types::{
    CrawlFailure, CrawlRequest, CrawlResult, CrawlStatus, Document, PageRecord,
};
use crate::crawler::visited::VisitedSet;
use crate::render::{ConfiguredRenderer, RenderError, RenderedPage, Renderer};
use crate::storage::{content_hash, tenant_dir_name, FsPageStore, PageStore};
use crate::url::{normalize, AllowList, VisitedKey};
use crate::{CrawlError, UrlError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Drives crawls with a given renderer and page store
///
/// A coordinator can run any number of crawls one after another; no state
/// carries over between them.
pub struct Coordinator<R, S> {
    config: CrawlerConfig,
    renderer: R,
    store: S,
}

/// State shared by the workers of one crawl
struct CrawlContext<'a> {
    request: &'a CrawlRequest,
    allow: AllowList,
    frontier: Frontier,
    visited: VisitedSet,
    seen_content: Mutex<HashSet<String>>,
    rendered: AtomicUsize,
    started: Instant,
}

/// What one worker produced; merged once all workers finish
#[derive(Default)]
struct WorkerOutput {
    pages: Vec<PageRecord>,
    failures: Vec<CrawlFailure>,
}

impl<R: Renderer, S: PageStore> Coordinator<R, S> {
    pub fn new(config: CrawlerConfig, renderer: R, store: S) -> Self {
        Self {
            config,
            renderer,
            store,
        }
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (R, S) {
        (self.renderer, self.store)
    }

    /// Runs a crawl to completion
    pub async fn run(&self, request: &CrawlRequest) -> Result<CrawlResult, CrawlError> {
        self.run_with_cancel(request, &CancellationToken::new()).await
    }

    /// Runs a crawl that stops early once `cancel` fires
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Every page persisted before the crawl ended, plus
    ///   per-page failures. The status tells whether the result is partial.
    /// * `Err(CrawlError)` - The tenant's storage could not be prepared
    pub async fn run_with_cancel(
        &self,
        request: &CrawlRequest,
        cancel: &CancellationToken,
    ) -> Result<CrawlResult, CrawlError> {
        let mut result = CrawlResult::empty(&request.tenant);

        if request.starter_urls.is_empty() {
            tracing::info!("No starter URLs for tenant {}, nothing to crawl", request.tenant);
            return Ok(result);
        }

        self.store.prepare_tenant(&request.tenant).await?;

        let ctx = CrawlContext::new(request);
        ctx.seed(&mut result.failures);

        tracing::info!(
            "Starting crawl for tenant {}: {} starter URLs, {} hops, allowed hosts [{}]",
            request.tenant,
            ctx.frontier.len(),
            request.hops,
            ctx.allow.hosts().collect::<Vec<_>>().join(", ")
        );

        if cancel.is_cancelled() {
            ctx.frontier.close();
            result.status = CrawlStatus::Aborted;
            result.elapsed = ctx.started.elapsed();
            return Ok(result);
        }

        let workers = futures::future::join_all(
            (0..self.config.concurrency.max(1)).map(|id| self.worker(id, &ctx)),
        );
        tokio::pin!(workers);
        let stop = stop_signal(cancel, self.config.crawl_timeout());
        tokio::pin!(stop);

        let mut stopped = None;
        let outputs = loop {
            tokio::select! {
                outputs = &mut workers => break outputs,
                status = &mut stop, if stopped.is_none() => {
                    tracing::warn!(
                        "Crawl {}, finishing {} in-flight pages",
                        status,
                        ctx.frontier.in_flight()
                    );
                    ctx.frontier.close();
                    stopped = Some(status);
                }
            }
        };

        for output in outputs {
            result.pages.extend(output.pages);
            result.failures.extend(output.failures);
        }
        result.status = stopped.unwrap_or(CrawlStatus::Completed);
        result.elapsed = ctx.started.elapsed();

        tracing::info!(
            "Crawl {} for tenant {}: {} pages stored, {} failures in {:?}",
            result.status,
            request.tenant,
            result.pages.len(),
            result.failures.len(),
            result.elapsed
        );

        Ok(result)
    }

    async fn worker(&self, id: usize, ctx: &CrawlContext<'_>) -> WorkerOutput {
        let mut output = WorkerOutput::default();
        tracing::trace!("Worker {} started", id);

        while let Some(lease) = ctx.frontier.next().await {
            self.process(lease.entry(), ctx, &mut output).await;
        }

        tracing::trace!("Worker {} finished", id);
        output
    }

    /// Renders, persists and expands a single entry
    ///
    /// Children are pushed before the caller releases the entry's lease.
    async fn process(&self, entry: &FrontierEntry, ctx: &CrawlContext<'_>, output: &mut WorkerOutput) {
        tracing::debug!("Rendering {} (depth {})", entry.url, entry.depth);

        let page = match self.render_with_retries(&entry.url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to render {}: {}", entry.url, e);
                output
                    .failures
                    .push(CrawlFailure::fetch(&entry.url, entry.depth, &e));
                return;
            }
        };
        ctx.record_progress();

        if !self.admit_redirect(entry, &page, ctx) {
            return;
        }

        let hash = self
            .config
            .dedupe_content
            .then(|| content_hash(page.html.as_bytes()));

        if hash.as_ref().is_some_and(|h| !ctx.claim_content(h)) {
            tracing::debug!("Skipping duplicate content at {}", entry.url);
        } else {
            match self
                .store
                .persist(&ctx.request.tenant, entry.url.as_str(), &page.html)
                .await
            {
                Ok(stored) => output.pages.push(PageRecord {
                    url: entry.url.to_string(),
                    depth: entry.depth,
                    content_ref: stored.content_ref,
                    content_hash: Some(stored.content_hash),
                    size: stored.size,
                }),
                Err(e) => {
                    tracing::warn!("Failed to persist {}: {}", entry.url, e);
                    if let Some(h) = &hash {
                        ctx.release_content(h);
                    }
                    output
                        .failures
                        .push(CrawlFailure::persistence(&entry.url, entry.depth, &e));
                    return;
                }
            }
        }

        if entry.depth < ctx.request.hops {
            self.enqueue_links(entry, &page, ctx);
        }
    }

    /// Whether a rendered page is kept after following redirects
    ///
    /// A page that landed elsewhere is kept only when the target is on an
    /// allowed host and was not admitted before.
    fn admit_redirect(
        &self,
        entry: &FrontierEntry,
        page: &RenderedPage,
        ctx: &CrawlContext<'_>,
    ) -> bool {
        let final_key = match normalize(&page.final_url) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Dropping {}: redirected to {}: {}", entry.url, page.final_url, e);
                return false;
            }
        };
        if final_key == entry.key {
            return true;
        }

        if !ctx.allow.is_allowed(&page.final_url) {
            tracing::debug!(
                "Dropping {}: redirected off-domain to {}",
                entry.url,
                page.final_url
            );
            return false;
        }
        if !ctx.visited.try_admit(final_key) {
            tracing::debug!(
                "Dropping {}: redirect target {} already admitted",
                entry.url,
                page.final_url
            );
            return false;
        }
        true
    }

    /// Admits the page's links at the next depth
    fn enqueue_links(&self, entry: &FrontierEntry, page: &RenderedPage, ctx: &CrawlContext<'_>) {
        let mut admitted = 0;

        for mut link in resolve_links(&page.links, &page.final_url) {
            let key = match normalize(&link) {
                Ok(key) => key,
                Err(e) => {
                    tracing::debug!("Skipping link {}: {}", link, e);
                    continue;
                }
            };

            if !ctx.allow.is_allowed(&link) {
                tracing::trace!("Skipping off-domain link {}", link);
                continue;
            }

            if ctx.visited.try_admit(key.clone()) {
                link.set_fragment(None);
                let child = FrontierEntry {
                    url: link,
                    key,
                    depth: entry.depth + 1,
                };
                if ctx.frontier.push(child) {
                    admitted += 1;
                }
            }
        }

        tracing::debug!(
            "Queued {} of {} links from {}",
            admitted,
            page.links.len(),
            entry.url
        );
    }

    async fn render_with_retries(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let mut attempt = 0;
        loop {
            match self.renderer.render(url, self.config.page_timeout()).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.config.fetch_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} after transient error ({}/{}): {}",
                        url,
                        attempt,
                        self.config.fetch_retries,
                        e
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<'a> CrawlContext<'a> {
    fn new(request: &'a CrawlRequest) -> Self {
        Self {
            request,
            allow: request.allow_list(),
            frontier: Frontier::new(),
            visited: VisitedSet::new(),
            seen_content: Mutex::new(HashSet::new()),
            rendered: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    /// Admits the starter URLs at depth 0
    ///
    /// Invalid starters are recorded and skipped; duplicates collapse to one.
    fn seed(&self, failures: &mut Vec<CrawlFailure>) {
        for raw in &self.request.starter_urls {
            match parse_starter(raw) {
                Ok((url, key)) => {
                    if self.visited.try_admit(key.clone()) {
                        self.frontier.push(FrontierEntry { url, key, depth: 0 });
                    } else {
                        tracing::debug!("Duplicate starter URL {}", raw);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping starter URL {:?}: {}", raw, e);
                    failures.push(CrawlFailure::invalid_url(raw, 0, &e));
                }
            }
        }
    }

    /// Returns false if identical content was already claimed
    fn claim_content(&self, hash: &str) -> bool {
        self.seen_content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash.to_string())
    }

    fn release_content(&self, hash: &str) {
        self.seen_content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(hash);
    }

    fn record_progress(&self) {
        let rendered = self.rendered.fetch_add(1, Ordering::Relaxed) + 1;
        if rendered % 10 == 0 {
            let rate = rendered as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages rendered, {} queued, {} in flight, {:.2} pages/sec",
                rendered,
                self.frontier.len(),
                self.frontier.in_flight(),
                rate
            );
        }
    }
}

fn parse_starter(raw: &str) -> Result<(Url, VisitedKey), UrlError> {
    let url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{raw}: {e}")))?;
    let key = normalize(&url)?;
    Ok((url, key))
}

/// Resolves with the status the crawl should end with if it is cut short
async fn stop_signal(cancel: &CancellationToken, timeout: Option<Duration>) -> CrawlStatus {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => CrawlStatus::Aborted,
        _ = deadline => CrawlStatus::TimedOut,
    }
}

/// Crawls with default configuration
///
/// Pages are rendered with the default renderer and stored under the default
/// storage root.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), hopcrawl::CrawlError> {
/// let result = hopcrawl::crawl("acme", ["https://example.com/"], 2).await?;
/// println!("{} pages", result.pages().len());
/// # Ok(())
/// # }
/// ```
pub async fn crawl<I>(tenant: &str, starter_urls: I, hops: u32) -> Result<CrawlResult, CrawlError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let request = CrawlRequest::new(tenant, starter_urls, hops);
    crawl_with_config(&Config::default(), &request, &CancellationToken::new()).await
}

/// Crawls with an explicit configuration and cancellation token
///
/// Builds the configured renderer and an [`FsPageStore`], runs the crawl and
/// shuts the renderer down again.
///
/// # Returns
///
/// * `Ok(CrawlResult)` - The crawl ran; see [`CrawlResult::status`]
/// * `Err(CrawlError)` - Pre-flight failure: invalid configuration or tenant,
///   unusable storage root or no renderer could be started
pub async fn crawl_with_config(
    config: &Config,
    request: &CrawlRequest,
    cancel: &CancellationToken,
) -> Result<CrawlResult, CrawlError> {
    if request.starter_urls.is_empty() {
        return Ok(CrawlResult::empty(&request.tenant));
    }
    validate(config)?;
    tenant_dir_name(&request.tenant)?;

    let store = FsPageStore::open(&config.storage.root)?;
    let renderer = ConfiguredRenderer::from_config(&config.renderer)
        .await
        .map_err(|e| CrawlError::RendererUnavailable(e.to_string()))?;

    let coordinator = Coordinator::new(config.crawler.clone(), renderer, store);
    let result = coordinator.run_with_cancel(request, cancel).await;

    let (renderer, _store) = coordinator.into_parts();
    renderer.shutdown().await;

    result
}

/// Reads back the content of every page in `result`
///
/// Pages whose content can no longer be read are logged and left out.
pub async fn load_documents<S: PageStore>(store: &S, result: &CrawlResult) -> Vec<Document> {
    let mut documents = Vec::with_capacity(result.pages.len());

    for page in &result.pages {
        match store.read(&page.content_ref).await {
            Ok(content) => documents.push(Document {
                url: page.url.clone(),
                tenant: result.tenant.clone(),
                depth: page.depth,
                content,
            }),
            Err(e) => tracing::warn!("Failed to load {}: {}", page.url, e),
        }
    }

    documents
}
