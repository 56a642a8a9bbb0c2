//! mediacrawl main entry point
//!
//! This is the command-line interface for the mediacrawl site crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mediacrawl::config::{load_config_with_hash, CrawlConfig};
use mediacrawl::storage::{MarkedPages, PageCache, SqliteCache};
use mediacrawl::Crawler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// mediacrawl: a polite, rule-driven site crawler
///
/// mediacrawl crawls the configured sites from their seed URLs, caches every
/// page it fetches and marks the pages worth handing to text extraction.
#[derive(Parser, Debug)]
#[command(name = "mediacrawl")]
#[command(version)]
#[command(about = "A polite, rule-driven site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Page cache location, overriding `database-path`
    #[arg(long, value_name = "PATH", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the named sites, or all sites
    Crawl {
        #[arg(value_name = "SITE")]
        sites: Vec<String>,
    },

    /// Print `site<TAB>url` for every cached page marked for parsing
    Marked {
        #[arg(value_name = "SITE")]
        sites: Vec<String>,
    },

    /// Validate the configuration and show what would be crawled
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command {
        Command::Crawl { sites } => handle_crawl(config, &sites).await,
        Command::Marked { sites } => handle_marked(&config, sites).await,
        Command::Check => {
            handle_check(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("mediacrawl=info,warn"),
            1 => EnvFilter::new("mediacrawl=debug,info"),
            2 => EnvFilter::new("mediacrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_cache(config: &CrawlConfig) -> anyhow::Result<Arc<dyn PageCache>> {
    let cache = SqliteCache::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open page cache {}",
            config.database_path.display()
        )
    })?;
    Ok(Arc::new(cache))
}

/// Runs a crawl
async fn handle_crawl(config: CrawlConfig, sites: &[String]) -> anyhow::Result<()> {
    let cache = open_cache(&config)?;
    let crawler = Crawler::new(config, cache);
    let stats = crawler.run(sites).await?;
    println!("{}", stats);
    Ok(())
}

/// Streams marked pages to stdout
async fn handle_marked(config: &CrawlConfig, sites: Vec<String>) -> anyhow::Result<()> {
    let cache = open_cache(config)?;
    let mut pages = MarkedPages::new(cache, sites);
    while let Some(page) = pages.next().await? {
        println!("{}\t{}", page.site, page.url);
    }
    Ok(())
}

/// Prints the configuration the crawler would run with
fn handle_check(config: &CrawlConfig) {
    println!("=== mediacrawl configuration ===\n");
    println!("Workers: {}", config.concurrency);
    println!("User agent: {}", config.user_agent);
    println!("Database: {}", config.database_path.display());

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!(
            "  - {} (delay {}s, {} per host, {} seeds)",
            site.name,
            site.delay,
            site.domain_concurrency,
            site.urls.len()
        );
        for seed in &site.urls {
            println!("    * {}", seed);
        }
        if let Some(rule) = &site.crawl {
            println!("    crawl: {:?}", rule);
        }
        if let Some(rule) = &site.parse {
            println!("    parse: {:?}", rule);
        }
    }
}
