//! hopcrawl main entry point
//!
//! This is the command-line interface for the hopcrawl crawler.

use anyhow::Context;
use clap::Parser;
use hopcrawl::config::{load_config_with_hash, validate, Config};
use hopcrawl::crawler::{crawl_with_config, CancellationToken, CrawlRequest};
use hopcrawl::output::{print_pages, print_statistics, CrawlStatistics};
use hopcrawl::storage::FsPageStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// hopcrawl: a bounded, domain-scoped crawler
///
/// Renders each starter URL, follows links on the same hosts up to the hop
/// limit and stores every rendered page under the tenant's directory.
#[derive(Parser, Debug)]
#[command(name = "hopcrawl")]
#[command(version)]
#[command(about = "A bounded, domain-scoped, multi-hop crawler", long_about = None)]
struct Cli {
    /// Starter URLs; their hosts form the allow-list
    #[arg(value_name = "URL", required_unless_present = "list")]
    urls: Vec<String>,

    /// Tenant that owns the stored pages
    #[arg(short, long)]
    tenant: String,

    /// Maximum link-following distance from a starter URL
    #[arg(long, default_value_t = 1)]
    hops: u32,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the storage root from the configuration
    #[arg(long, value_name = "DIR")]
    storage_root: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and inputs and show what would be crawled
    #[arg(long, conflicts_with = "list")]
    dry_run: bool,

    /// List pages already stored for the tenant and exit
    #[arg(long, conflicts_with = "dry_run")]
    list: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    if let Some(root) = &cli.storage_root {
        config.storage.root = root.clone();
    }
    validate(&config).context("Invalid configuration")?;

    let request = CrawlRequest::new(cli.tenant.as_str(), &cli.urls, cli.hops);

    if cli.dry_run {
        handle_dry_run(&config, &request);
        Ok(())
    } else if cli.list {
        handle_list(&config, &request.tenant)
    } else {
        handle_crawl(&config, &request).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hopcrawl=info,warn"),
            1 => EnvFilter::new("hopcrawl=debug,info"),
            2 => EnvFilter::new("hopcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: validates inputs and shows the crawl plan
fn handle_dry_run(config: &Config, request: &CrawlRequest) {
    println!("=== hopcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.concurrency);
    println!("  Page timeout: {:?}", config.crawler.page_timeout());
    match config.crawler.crawl_timeout() {
        Some(timeout) => println!("  Crawl timeout: {:?}", timeout),
        None => println!("  Crawl timeout: none"),
    }
    println!("  Fetch retries: {}", config.crawler.fetch_retries);
    println!("  Dedupe content: {}", config.crawler.dedupe_content);

    println!("\nRenderer:");
    println!("  Kind: {:?}", config.renderer.kind);
    println!("  User agent: {}", config.renderer.user_agent);

    println!("\nStorage:");
    println!("  Root: {}", config.storage.root.display());
    match hopcrawl::storage::tenant_dir_name(&request.tenant) {
        Ok(dir) => println!("  Tenant directory: {}", dir),
        Err(e) => println!("  ✗ {}", e),
    }

    println!("\nStarter URLs ({}):", request.starter_urls.len());
    for url in &request.starter_urls {
        match hopcrawl::normalize_url(url) {
            Ok(key) => println!("  ✓ {} ({})", url, key),
            Err(e) => println!("  ✗ {} ({})", url, e),
        }
    }

    let allow = request.allow_list();
    println!("\nAllowed Hosts ({}):", allow.len());
    for host in allow.hosts() {
        println!("  - {}", host);
    }

    println!("\nWould crawl up to {} hops", request.hops);
}

/// Handles the --list mode: prints the tenant's manifest
fn handle_list(config: &Config, tenant: &str) -> anyhow::Result<()> {
    let store = FsPageStore::open(&config.storage.root)
        .with_context(|| format!("Failed to open store at {}", config.storage.root.display()))?;

    let pages = store.list_pages(tenant)?;
    println!("{} pages stored for tenant {}\n", pages.len(), tenant);
    for page in pages {
        println!("{}\t{}\t{}\t{}", page.crawled_at, page.size, page.url, page.path);
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, request: &CrawlRequest) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping crawl");
                cancel.cancel();
            }
        });
    }

    let result = match crawl_with_config(config, request, &cancel).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_pages(&result);
    println!();
    print_statistics(&CrawlStatistics::from_result(&result));

    Ok(())
}
