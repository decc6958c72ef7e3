use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for hopcrawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent render workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-page render timeout (milliseconds)
    #[serde(rename = "page-timeout-ms", default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Optional wall-clock bound for a whole crawl (seconds)
    #[serde(rename = "crawl-timeout-secs", default)]
    pub crawl_timeout_secs: Option<u64>,

    /// Extra attempts for transient fetch failures
    #[serde(rename = "fetch-retries", default)]
    pub fetch_retries: u32,

    /// Delay between retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Skip persisting pages whose content is byte-identical to one already stored
    #[serde(rename = "dedupe-content", default)]
    pub dedupe_content: bool,
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            page_timeout_ms: default_page_timeout_ms(),
            crawl_timeout_secs: None,
            fetch_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            dedupe_content: false,
        }
    }
}

/// Which renderer backs the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Headless Chromium over the DevTools protocol
    Chromium,
    /// Plain HTTP fetch, no script execution
    Http,
}

/// Renderer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_renderer_kind")]
    pub kind: RendererKind,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Path to a Chrome/Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-executable", default)]
    pub chrome_executable: Option<PathBuf>,

    /// Launch Chromium with `--no-sandbox` (needed inside most containers)
    #[serde(rename = "no-sandbox", default)]
    pub no_sandbox: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            kind: default_renderer_kind(),
            user_agent: default_user_agent(),
            headless: default_headless(),
            chrome_executable: None,
            no_sandbox: false,
        }
    }
}

/// Page store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory; each tenant gets its own subdirectory
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_page_timeout_ms() -> u64 {
    10_000
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_renderer_kind() -> RendererKind {
    if cfg!(feature = "chromium") {
        RendererKind::Chromium
    } else {
        RendererKind::Http
    }
}

fn default_user_agent() -> String {
    format!("hopcrawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_headless() -> bool {
    true
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./crawl-data")
}
