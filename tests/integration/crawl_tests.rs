//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with a canned renderer serving an
//! in-memory site, so link graphs, failures and timing are fully controlled.
//! The last tests use wiremock and the HTTP renderer to exercise the full
//! stack over real sockets.

use hopcrawl::config::{Config, CrawlerConfig, RendererConfig, RendererKind, StorageConfig};
use hopcrawl::crawler::{crawl_with_config, load_documents};
use hopcrawl::render::HttpRenderer;
use hopcrawl::{
    CancellationToken, Coordinator, CrawlRequest, CrawlResult, CrawlStatus, FailureKind,
    FsPageStore, PageStore, RenderError, RenderedPage, Renderer,
};
use hopcrawl::storage::{ContentRef, StorageError, StorageResult, StoredContent};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves canned pages and records every URL it is asked to render
#[derive(Default)]
struct StubRenderer {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    redirects: HashMap<String, String>,
    delay: Duration,
    rendered: Mutex<Vec<String>>,
}

impl StubRenderer {
    /// Builds a site from `(url, links)` pairs
    fn site(pages: &[(&str, &[&str])]) -> Self {
        let pages = pages
            .iter()
            .map(|(url, links)| {
                let anchors: String = links
                    .iter()
                    .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
                    .collect();
                (
                    url.to_string(),
                    format!("<html><body><h1>{url}</h1>{anchors}</body></html>"),
                )
            })
            .collect();
        Self {
            pages,
            ..Self::default()
        }
    }

    /// `count` pages `/p0 .. /p{count-1}`, each linking to the next
    fn chain(count: usize) -> Self {
        let mut pages = HashMap::new();
        for i in 0..count {
            pages.insert(
                format!("https://a.com/p{i}"),
                format!(r#"<html><body><a href="/p{}">next</a></body></html>"#, i + 1),
            );
        }
        Self {
            pages,
            ..Self::default()
        }
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Rendering `from` lands on `to`, as after an HTTP or script redirect
    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

impl Renderer for StubRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        self.rendered.lock().unwrap().push(url.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.contains(url.as_str()) {
            return Err(RenderError::Timeout {
                url: url.to_string(),
                timeout,
            });
        }

        let final_url = match self.redirects.get(url.as_str()) {
            Some(target) => Url::parse(target).unwrap(),
            None => url.clone(),
        };
        let html = self
            .pages
            .get(final_url.as_str())
            .ok_or_else(|| RenderError::Status {
                url: url.to_string(),
                status: 404,
            })?;

        Ok(RenderedPage {
            final_url,
            status: 200,
            html: html.clone(),
            links: hopcrawl::crawler::extract_raw_links(html),
        })
    }
}

fn crawler_config(concurrency: usize) -> CrawlerConfig {
    CrawlerConfig {
        concurrency,
        page_timeout_ms: 1_000,
        ..CrawlerConfig::default()
    }
}

fn coordinator(
    renderer: StubRenderer,
    concurrency: usize,
) -> (tempfile::TempDir, Coordinator<StubRenderer, FsPageStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = FsPageStore::open(dir.path()).unwrap();
    (dir, Coordinator::new(crawler_config(concurrency), renderer, store))
}

fn sorted_urls(result: &CrawlResult) -> Vec<String> {
    let mut urls: Vec<String> = result.pages().iter().map(|p| p.url.clone()).collect();
    urls.sort();
    urls
}

fn depth_of(result: &CrawlResult, url: &str) -> u32 {
    result
        .pages()
        .iter()
        .find(|p| p.url == url)
        .unwrap_or_else(|| panic!("{url} not crawled"))
        .depth
}

fn two_domain_site() -> StubRenderer {
    StubRenderer::site(&[
        ("https://a.com/", &["/x", "https://b.com/y"]),
        ("https://a.com/x", &["/z"]),
        ("https://a.com/z", &[]),
        ("https://b.com/y", &[]),
    ])
}

#[tokio::test]
async fn test_one_hop_stays_on_starter_domain() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 4);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com"], 1))
        .await
        .unwrap();

    assert_eq!(result.status(), CrawlStatus::Completed);
    assert_eq!(sorted_urls(&result), vec!["https://a.com/", "https://a.com/x"]);
    assert_eq!(depth_of(&result, "https://a.com/"), 0);
    assert_eq!(depth_of(&result, "https://a.com/x"), 1);

    let rendered = coordinator.renderer().rendered();
    assert!(!rendered.iter().any(|u| u.contains("b.com")));
    assert!(!rendered.contains(&"https://a.com/z".to_string()));
}

#[tokio::test]
async fn test_two_hops_reaches_depth_two() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 4);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com"], 2))
        .await
        .unwrap();

    assert_eq!(
        sorted_urls(&result),
        vec!["https://a.com/", "https://a.com/x", "https://a.com/z"]
    );
    assert_eq!(depth_of(&result, "https://a.com/z"), 2);
}

#[tokio::test]
async fn test_zero_hops_renders_starters_only() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 4);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 0))
        .await
        .unwrap();

    assert_eq!(sorted_urls(&result), vec!["https://a.com/"]);
    assert_eq!(coordinator.renderer().rendered(), vec!["https://a.com/"]);
}

#[tokio::test]
async fn test_depth_never_exceeds_hops() {
    let (_dir, coordinator) = coordinator(StubRenderer::chain(20), 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/p0"], 3))
        .await
        .unwrap();

    assert_eq!(result.pages().len(), 4);
    assert!(result.pages().iter().all(|p| p.depth <= 3));
    assert!(!coordinator
        .renderer()
        .rendered()
        .contains(&"https://a.com/p4".to_string()));
}

#[tokio::test]
async fn test_no_url_rendered_twice_under_concurrency() {
    // Every page links to every other page, with trailing-slash and fragment
    // variants of the same targets.
    let count = 30;
    let links: Vec<String> = (0..count)
        .flat_map(|i| [format!("/n{i}"), format!("/n{i}/"), format!("/n{i}#frag")])
        .collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let urls: Vec<String> = (0..count).map(|i| format!("https://a.com/n{i}")).collect();
    let pages: Vec<(&str, &[&str])> = urls
        .iter()
        .map(|u| (u.as_str(), link_refs.as_slice()))
        .collect();

    let renderer = StubRenderer::site(&pages).delay(Duration::from_millis(5));
    let (_dir, coordinator) = coordinator(renderer, 8);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/n0"], 3))
        .await
        .unwrap();

    let rendered = coordinator.renderer().rendered();
    let unique: HashSet<_> = rendered.iter().collect();
    assert_eq!(rendered.len(), unique.len(), "duplicate renders: {rendered:?}");
    assert_eq!(rendered.len(), count);
    assert_eq!(result.pages().len(), count);
}

#[tokio::test]
async fn test_duplicate_starters_collapse() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 4);

    let result = coordinator
        .run(&CrawlRequest::new(
            "acme",
            ["https://a.com", "https://a.com/", "https://A.com/#top"],
            0,
        ))
        .await
        .unwrap();

    assert_eq!(result.pages().len(), 1);
    assert_eq!(coordinator.renderer().rendered().len(), 1);
}

#[tokio::test]
async fn test_failing_page_does_not_stop_crawl() {
    let renderer = StubRenderer::site(&[
        ("https://a.com/", &["/bad", "/good"]),
        ("https://a.com/bad", &[]),
        ("https://a.com/good", &[]),
    ])
    .failing("https://a.com/bad");
    let (_dir, coordinator) = coordinator(renderer, 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 1))
        .await
        .unwrap();

    assert_eq!(result.status(), CrawlStatus::Completed);
    assert_eq!(sorted_urls(&result), vec!["https://a.com/", "https://a.com/good"]);
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].kind, FailureKind::Fetch);
    assert_eq!(result.failures()[0].url, "https://a.com/bad");
    assert_eq!(result.failures()[0].depth, 1);
}

#[tokio::test]
async fn test_failing_starter_still_crawls_others() {
    let renderer = StubRenderer::site(&[("https://b.com/", &[])]).failing("https://a.com/");
    let (_dir, coordinator) = coordinator(renderer, 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/", "https://b.com/"], 1))
        .await
        .unwrap();

    assert_eq!(sorted_urls(&result), vec!["https://b.com/"]);
    assert_eq!(result.failures().len(), 1);
}

#[tokio::test]
async fn test_invalid_starter_is_reported_and_skipped() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 2);

    let result = coordinator
        .run(&CrawlRequest::new(
            "acme",
            ["not a url", "ftp://a.com/file", "https://a.com/"],
            0,
        ))
        .await
        .unwrap();

    assert_eq!(sorted_urls(&result), vec!["https://a.com/"]);
    let kinds: Vec<_> = result.failures().iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FailureKind::InvalidUrl, FailureKind::InvalidUrl]);
}

#[tokio::test]
async fn test_empty_starters_yield_empty_result() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", Vec::<String>::new(), 3))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert!(result.failures().is_empty());
    assert_eq!(result.status(), CrawlStatus::Completed);
    assert!(coordinator.renderer().rendered().is_empty());
}

#[tokio::test]
async fn test_cancellation_returns_persisted_pages() {
    let renderer = StubRenderer::chain(200).delay(Duration::from_millis(20));
    let (_dir, coordinator) = coordinator(renderer, 1);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });
    }

    let result = coordinator
        .run_with_cancel(&CrawlRequest::new("acme", ["https://a.com/p0"], 500), &cancel)
        .await
        .unwrap();

    assert_eq!(result.status(), CrawlStatus::Aborted);
    assert!(!result.pages().is_empty());
    assert!(result.pages().len() < 200);

    // Everything reported must be readable.
    for page in result.pages() {
        assert!(coordinator.store().read(&page.content_ref).await.is_ok());
    }
}

#[tokio::test]
async fn test_cancel_before_start() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 2);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = coordinator
        .run_with_cancel(&CrawlRequest::new("acme", ["https://a.com/"], 1), &cancel)
        .await
        .unwrap();

    assert_eq!(result.status(), CrawlStatus::Aborted);
    assert!(result.is_empty());
    assert!(coordinator.renderer().rendered().is_empty());
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsPageStore::open(dir.path()).unwrap();
    let coordinator = Coordinator::new(crawler_config(2), two_domain_site(), store);

    let acme = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 1))
        .await
        .unwrap();
    let globex = coordinator
        .run(&CrawlRequest::new("globex", ["https://a.com/"], 1))
        .await
        .unwrap();

    let acme_refs: HashSet<_> = acme.pages().iter().map(|p| p.content_ref.clone()).collect();
    assert!(globex
        .pages()
        .iter()
        .all(|p| !acme_refs.contains(&p.content_ref)));

    let acme_dir = coordinator.store().tenant_dir("acme").unwrap();
    assert!(acme.pages().iter().all(|p| p.content_ref.path().starts_with(&acme_dir)));

    assert_eq!(coordinator.store().list_pages("acme").unwrap().len(), 2);
    assert_eq!(coordinator.store().list_pages("globex").unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_crawls_keep_separate_state() {
    let site = two_domain_site().delay(Duration::from_millis(10));
    let (_dir, coordinator) = coordinator(site, 2);

    let acme_request = CrawlRequest::new("acme", ["https://a.com/"], 1);
    let globex_request = CrawlRequest::new("globex", ["https://a.com/"], 1);
    let (acme, globex) = tokio::join!(
        coordinator.run(&acme_request),
        coordinator.run(&globex_request),
    );
    let (acme, globex) = (acme.unwrap(), globex.unwrap());

    let expected = vec!["https://a.com/", "https://a.com/x"];
    assert_eq!(sorted_urls(&acme), expected);
    assert_eq!(sorted_urls(&globex), expected);
    assert_eq!(coordinator.renderer().rendered().len(), 4);
    assert_eq!(coordinator.store().list_pages("acme").unwrap().len(), 2);
    assert_eq!(coordinator.store().list_pages("globex").unwrap().len(), 2);
}

#[tokio::test]
async fn test_redirect_to_admitted_url_is_not_stored_twice() {
    let site = StubRenderer::site(&[
        ("https://a.com/", &["/new", "/old"]),
        ("https://a.com/new", &[]),
    ])
    .redirect("https://a.com/old", "https://a.com/new");
    let (_dir, coordinator) = coordinator(site, 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 1))
        .await
        .unwrap();

    assert_eq!(sorted_urls(&result), vec!["https://a.com/", "https://a.com/new"]);
    assert!(result.failures().is_empty());
    assert_eq!(coordinator.store().list_pages("acme").unwrap().len(), 2);
}

#[tokio::test]
async fn test_off_domain_redirect_is_not_stored() {
    let site = StubRenderer::site(&[
        ("https://a.com/", &["/ext"]),
        ("https://b.com/x", &["https://b.com/y"]),
        ("https://b.com/y", &[]),
    ])
    .redirect("https://a.com/ext", "https://b.com/x");
    let (_dir, coordinator) = coordinator(site, 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 2))
        .await
        .unwrap();

    assert_eq!(sorted_urls(&result), vec!["https://a.com/"]);
    let documents = load_documents(coordinator.store(), &result).await;
    assert!(documents.iter().all(|d| !d.content.contains("b.com/x")));
    assert!(!coordinator
        .renderer()
        .rendered()
        .contains(&"https://b.com/y".to_string()));
}

#[tokio::test]
async fn test_redirect_target_is_not_rendered_again() {
    let site = StubRenderer::site(&[
        ("https://a.com/", &["/moved"]),
        ("https://a.com/fresh", &["/fresh", "/"]),
    ])
    .redirect("https://a.com/moved", "https://a.com/fresh");
    let (_dir, coordinator) = coordinator(site, 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 3))
        .await
        .unwrap();

    assert_eq!(sorted_urls(&result), vec!["https://a.com/", "https://a.com/moved"]);
    assert_eq!(depth_of(&result, "https://a.com/moved"), 1);

    let mut rendered = coordinator.renderer().rendered();
    rendered.sort();
    assert_eq!(rendered, vec!["https://a.com/", "https://a.com/moved"]);
}

/// File store that refuses to write selected URLs
struct FailingStore {
    inner: FsPageStore,
    fail: HashSet<String>,
}

impl PageStore for FailingStore {
    async fn prepare_tenant(&self, tenant: &str) -> StorageResult<()> {
        self.inner.prepare_tenant(tenant).await
    }

    async fn persist(&self, tenant: &str, url: &str, html: &str) -> StorageResult<StoredContent> {
        if self.fail.contains(url) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.persist(tenant, url, html).await
    }

    async fn read(&self, content_ref: &ContentRef) -> StorageResult<String> {
        self.inner.read(content_ref).await
    }
}

#[tokio::test]
async fn test_persist_failure_drops_page_and_crawl_continues() {
    let site = StubRenderer::site(&[
        ("https://a.com/", &["/broken", "/ok"]),
        ("https://a.com/broken", &["/behind-broken"]),
        ("https://a.com/ok", &["/behind-ok"]),
        ("https://a.com/behind-broken", &[]),
        ("https://a.com/behind-ok", &[]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let store = FailingStore {
        inner: FsPageStore::open(dir.path()).unwrap(),
        fail: HashSet::from(["https://a.com/broken".to_string()]),
    };
    let coordinator = Coordinator::new(crawler_config(2), site, store);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 2))
        .await
        .unwrap();

    assert_eq!(result.status(), CrawlStatus::Completed);
    assert_eq!(
        sorted_urls(&result),
        vec!["https://a.com/", "https://a.com/behind-ok", "https://a.com/ok"]
    );

    assert_eq!(result.failures().len(), 1);
    let failure = &result.failures()[0];
    assert_eq!(failure.kind, FailureKind::Persistence);
    assert_eq!(failure.url, "https://a.com/broken");
    assert_eq!(failure.depth, 1);
    assert!(failure.message.contains("disk full"));

    assert!(!coordinator
        .renderer()
        .rendered()
        .contains(&"https://a.com/behind-broken".to_string()));
    assert_eq!(coordinator.store().inner.list_pages("acme").unwrap().len(), 3);
}

#[tokio::test]
async fn test_recrawl_overwrites_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsPageStore::open(dir.path()).unwrap();
    let coordinator = Coordinator::new(crawler_config(2), two_domain_site(), store);
    let request = CrawlRequest::new("acme", ["https://a.com/"], 2);

    let first = coordinator.run(&request).await.unwrap();
    let second = coordinator.run(&request).await.unwrap();

    let first_refs: HashSet<_> = first.pages().iter().map(|p| p.content_ref.clone()).collect();
    let second_refs: HashSet<_> = second.pages().iter().map(|p| p.content_ref.clone()).collect();
    assert_eq!(first_refs, second_refs);
    assert_eq!(coordinator.store().list_pages("acme").unwrap().len(), 3);
}

#[tokio::test]
async fn test_load_documents_carries_tenant_and_content() {
    let (_dir, coordinator) = coordinator(two_domain_site(), 2);

    let result = coordinator
        .run(&CrawlRequest::new("acme", ["https://a.com/"], 1))
        .await
        .unwrap();
    let documents = load_documents(coordinator.store(), &result).await;

    assert_eq!(documents.len(), 2);
    for document in &documents {
        assert_eq!(document.tenant, "acme");
        assert!(document.content.contains(&format!("<h1>{}</h1>", document.url)));
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_http_renderer_end_to_end() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<html><body>
            <a href="/page1">Page 1</a>
            <a href="page2">Page 2</a>
            <a href="https://elsewhere.example/">Off-site</a>
            <a href="mailto:someone@example.com">Mail</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_page(&server, "/page1", "<html><body>one</body></html>".to_string()).await;
    mount_page(
        &server,
        "/page2",
        r#"<html><body><a href="/deep">Deep</a></body></html>"#.to_string(),
    )
    .await;
    mount_page(&server, "/deep", "<html><body>deep</body></html>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let renderer = HttpRenderer::new(&RendererConfig {
        kind: RendererKind::Http,
        ..RendererConfig::default()
    })
    .unwrap();
    let coordinator = Coordinator::new(
        crawler_config(3),
        renderer,
        FsPageStore::open(dir.path()).unwrap(),
    );

    let result = coordinator
        .run(&CrawlRequest::new("acme", [format!("{}/", server.uri())], 1))
        .await
        .unwrap();

    let paths: HashSet<String> = result
        .pages()
        .iter()
        .map(|p| Url::parse(&p.url).unwrap().path().to_string())
        .collect();
    assert_eq!(
        paths,
        HashSet::from(["/".to_string(), "/page1".to_string(), "/page2".to_string()])
    );

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(!requested.contains(&"/deep".to_string()));
}

#[tokio::test]
async fn test_crawl_with_config_http_renderer() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/next">Next</a></body></html>"#.to_string(),
    )
    .await;
    mount_page(&server, "/next", "<html><body>next</body></html>".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        crawler: crawler_config(2),
        renderer: RendererConfig {
            kind: RendererKind::Http,
            ..RendererConfig::default()
        },
        storage: StorageConfig {
            root: dir.path().join("data"),
        },
    };

    let request = CrawlRequest::new("acme", [server.uri()], 1);
    let result = crawl_with_config(&config, &request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status(), CrawlStatus::Completed);
    assert_eq!(result.pages().len(), 2);

    let store = FsPageStore::open(dir.path().join("data")).unwrap();
    let documents = load_documents(&store, &result).await;
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().any(|d| d.content.contains("next</body>")));
}
