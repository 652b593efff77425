//! scour CLI - resilient web search and content extraction.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use scour::{
    BrowserPool, BrowserPoolConfig, ExtractionPipeline, FetchStatus, ProcessReaper, ReaperConfig,
    SearchOrchestrator, SearchResult,
};

/// scour - resilient web search and content extraction CLI
#[derive(Parser)]
#[command(name = "scour")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the web with multi-engine fallback
    Search(SearchArgs),

    /// Extract readable text from a URL
    Extract(ExtractArgs),

    /// List the configured search backends
    Engines,

    /// Reclaim orphaned browser processes
    Cleanup(CleanupArgs),
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "5")]
    results: usize,

    /// Overall search timeout in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Also extract full content for the top results
    #[arg(short = 'x', long)]
    extract: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Parser)]
struct ExtractArgs {
    /// URL to extract
    url: String,

    /// Maximum extracted length in characters
    #[arg(short, long, default_value = "8000")]
    max_length: usize,

    /// Extraction timeout in seconds
    #[arg(short, long, default_value = "15")]
    timeout: u64,
}

#[derive(Parser)]
struct CleanupArgs {
    /// Kill every automation browser process regardless of age
    #[arg(long)]
    all: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Search(args) => run_search(args).await,
        Commands::Extract(args) => run_extract(args).await,
        Commands::Engines => list_engines(),
        Commands::Cleanup(args) => run_cleanup(args).await,
    }
}

fn list_engines() -> Result<()> {
    println!("Search backends, in fallback priority order:\n");
    println!("  Bing        - HTML scrape; baseline, needs corroboration");
    println!("  DuckDuckGo  - HTML scrape of the no-JS endpoint");
    println!("  Brave       - JSON API; requires BRAVE_SEARCH_API_KEY, 2000 calls/month");
    println!("  Google      - rendered via the shared headless browser");
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let pool = Arc::new(BrowserPool::new(BrowserPoolConfig::default()));
    let orchestrator = SearchOrchestrator::with_default_engines(Arc::clone(&pool));

    let (results, engine) = orchestrator
        .search(&args.query, args.results, Duration::from_secs(args.timeout))
        .await?;

    let results = if args.extract {
        let pipeline = ExtractionPipeline::new(Arc::clone(&pool));
        pipeline.extract_for_results(&results, args.results).await
    } else {
        results
    };

    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "engine": engine,
                "results": results,
            }))?
        ),
        OutputFormat::Text => print_results(&engine, &results),
    }

    pool.close_all().await;
    Ok(())
}

fn print_results(engine: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results (engine: {engine})");
        return;
    }
    println!("Results via {engine}:\n");
    for (i, result) in results.iter().enumerate() {
        println!("{}. {}", i + 1, result.title);
        println!("   {}", result.url);
        if !result.description.is_empty() {
            println!("   {}", result.description);
        }
        match result.fetch_status {
            FetchStatus::Success if result.word_count > 0 => {
                println!("   [{} words] {}", result.word_count, result.content_preview);
            }
            FetchStatus::Error => {
                if let Some(error) = &result.error {
                    println!("   [fetch failed: {error}]");
                }
            }
            _ => {}
        }
        println!();
    }
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let pool = Arc::new(BrowserPool::new(BrowserPoolConfig::default()));
    let pipeline = ExtractionPipeline::new(Arc::clone(&pool));

    let outcome = pipeline
        .extract(&args.url, args.max_length, Duration::from_secs(args.timeout))
        .await;

    pool.close_all().await;

    match outcome {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_cleanup(args: CleanupArgs) -> Result<()> {
    let reaper = ProcessReaper::new(ReaperConfig::default());
    let outcome = if args.all {
        reaper.emergency_sweep().await
    } else {
        reaper.sweep().await
    };
    println!(
        "Examined {} browser process(es), terminated {}",
        outcome.examined, outcome.terminated
    );

    let stats = reaper.stats().await;
    println!(
        "Remaining: {} process(es), {:.1} MiB, oldest {}s",
        stats.process_count,
        stats.memory_bytes as f64 / (1024.0 * 1024.0),
        stats.oldest_uptime_secs
    );
    Ok(())
}
