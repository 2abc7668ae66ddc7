//! # Vectoria CLI Application
//!
//! This module implements the command-line interface for Vectoria, giving
//! access to source management, indexing and search through a set of
//! subcommands.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands:
//!   - `sources`: list, add, update and remove registered sites
//!   - `index`: crawl one site and add it to the index
//!   - `reindex`: re-index every active source
//!   - `search`: query the index
//!   - `crawl`: crawl a site without indexing it
//!   - `stats`: registry and index statistics
//!
//! Ctrl-C cancels a running crawl; pages collected up to that point are
//! still indexed.

mod telemetry;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};
use vectoria::crawler::{Crawler, CrawlerConfig};
use vectoria::registry::{NewSource, SourceStatus, SourceUpdate};
use vectoria::service::{Outcome, Vectoria};
use vectoria::VectoriaConfig;

#[derive(Parser)]
#[command(author, version, about = "Crawl documentation sites and search them", long_about = None)]
struct Cli {
    /// Directory holding the registry, index records and collection
    #[arg(long, global = true, default_value = ".vectoria")]
    data_dir: PathBuf,

    /// Number of concurrent fetch workers per crawl
    #[arg(long, global = true, default_value = "1")]
    workers: usize,

    /// Pause after every request, in milliseconds
    #[arg(long, global = true, default_value = "500")]
    delay_ms: u64,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage registered sources
    #[command(subcommand)]
    Sources(SourcesCommand),

    /// Crawl a site and add its pages to the index
    Index(IndexArgs),

    /// Re-index every active source
    Reindex(ReindexArgs),

    /// Search the indexed content
    Search(SearchArgs),

    /// Crawl a site without indexing it
    Crawl(CrawlArgs),

    /// Show registry and index statistics
    Stats(FormatArgs),
}

#[derive(Subcommand, Debug)]
enum SourcesCommand {
    /// List registered sources
    List(FormatArgs),

    /// Register a source
    Add(AddArgs),

    /// Change the fields of a source
    Update(UpdateArgs),

    /// Remove a source and its index record
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Site URL
    #[arg(required = true)]
    url: String,

    /// Display name
    #[arg(short, long)]
    name: String,

    /// Description
    #[arg(short, long, default_value = "")]
    description: String,

    /// Category
    #[arg(short, long, default_value = "General")]
    category: String,

    /// Language tag
    #[arg(short, long, default_value = "es")]
    language: String,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// URL of the source
    #[arg(required = true)]
    url: String,

    /// New display name
    #[arg(short, long)]
    name: Option<String>,

    /// New description
    #[arg(short, long)]
    description: Option<String>,

    /// New category
    #[arg(short, long)]
    category: Option<String>,

    /// New status (active|inactive|error)
    #[arg(short, long)]
    status: Option<SourceStatus>,

    /// New language tag
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(Args, Debug)]
struct RemoveArgs {
    /// URL of the source
    #[arg(required = true)]
    url: String,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Site URL
    #[arg(required = true)]
    url: String,

    /// Maximum number of pages, 0 for every reachable page
    #[arg(short = 'p', long, default_value = "0")]
    max_pages: u32,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct ReindexArgs {
    /// Maximum number of pages per source, 0 for every reachable page
    #[arg(short = 'p', long, default_value = "0")]
    max_pages: u32,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Search query
    #[arg(required = true)]
    query: String,

    /// Filter by source host
    #[arg(short, long)]
    source: Option<String>,

    /// Limit results
    #[arg(short = 'k', long, default_value = "5")]
    limit: usize,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// URL to crawl
    #[arg(required = true)]
    url: String,

    /// Maximum number of pages, 0 for every reachable page
    #[arg(short = 'p', long, default_value = "20")]
    max_pages: u32,

    /// Save crawled pages to a JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig::builder()
            .workers(self.workers)
            .politeness_delay_ms(self.delay_ms)
            .build()
    }

    fn config(&self) -> VectoriaConfig {
        VectoriaConfig::builder()
            .data_dir(&self.data_dir)
            .crawler(self.crawler_config())
            .build()
    }
}

/// A token cancelled by Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the pages in flight");
            trigger.cancel();
        }
    });
    token
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    println!("{}", outcome.message);
    if let Some(source) = &outcome.source {
        println!("  {} <{}> [{}]", source.name, source.url, source.status);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber(cli.log_dir.as_deref())?;

    let Some(command) = cli.command.as_ref() else {
        // If no command is provided, show help
        let _ = Cli::parse_from(["vectoria", "--help"]);
        return Ok(());
    };

    match command {
        Commands::Crawl(args) => crawl_command(cli.crawler_config(), args).await?,
        command => {
            let service = Vectoria::open(cli.config()).await?;
            match command {
                Commands::Sources(sub) => sources_command(&service, sub).await?,
                Commands::Index(args) => index_command(&service, args).await?,
                Commands::Reindex(args) => reindex_command(&service, args).await?,
                Commands::Search(args) => search_command(&service, args).await?,
                Commands::Stats(args) => stats_command(&service, args).await?,
                Commands::Crawl(_) => {}
            }
        }
    }

    Ok(())
}

async fn sources_command(service: &Vectoria, command: &SourcesCommand) -> anyhow::Result<()> {
    match command {
        SourcesCommand::List(args) => {
            let sources = service.list_sources().await;
            if args.format == "json" {
                return print_json(&sources);
            }
            println!("Registered sources: {}", sources.len());
            for source in sources {
                let indexed = service
                    .records()
                    .get(&source.url)
                    .await
                    .map(|at| vectoria::timestamp::format(&at))
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "- {} <{}> [{}] {} / {} (last indexed: {})",
                    source.name, source.url, source.status, source.category, source.language, indexed
                );
            }
        }
        SourcesCommand::Add(args) => {
            let new = NewSource::new(&args.url, &args.name)
                .description(&args.description)
                .category(&args.category)
                .language(&args.language);
            print_outcome(&service.add_source(new).await);
        }
        SourcesCommand::Update(args) => {
            let update = SourceUpdate {
                name: args.name.clone(),
                description: args.description.clone(),
                category: args.category.clone(),
                status: args.status,
                language: args.language.clone(),
            };
            if update.is_empty() {
                println!("Nothing to update");
                return Ok(());
            }
            print_outcome(&service.update_source(&args.url, update).await);
        }
        SourcesCommand::Remove(args) => {
            print_outcome(&service.delete_source(&args.url).await);
        }
    }
    Ok(())
}

#[instrument(skip(service))]
async fn index_command(service: &Vectoria, args: &IndexArgs) -> anyhow::Result<()> {
    println!("Indexing {}...", args.url);
    let cancel = cancel_on_ctrl_c();
    let outcome = service.index_source(&args.url, args.max_pages, &cancel).await;

    if args.format == "json" {
        return print_json(&outcome);
    }
    println!("{}", outcome.message);
    if outcome.success {
        println!(
            "  {} documents, {} pages, {} failed batches, {:.2}s",
            outcome.documents_indexed,
            outcome.pages_processed,
            outcome.failed_batches,
            outcome.elapsed_secs
        );
    }
    if !outcome.durable {
        println!("  warning: the index record could not be saved");
    }
    Ok(())
}

#[instrument(skip(service))]
async fn reindex_command(service: &Vectoria, args: &ReindexArgs) -> anyhow::Result<()> {
    let active = service
        .list_sources()
        .await
        .into_iter()
        .filter(|source| source.status == SourceStatus::Active)
        .count();

    let progress_bar = ProgressBar::new(active as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    progress_bar.set_message("Indexing sources...");

    let cancel = cancel_on_ctrl_c();
    let outcome = service
        .reindex_all(args.max_pages, &cancel, |report| {
            progress_bar.inc(1);
            progress_bar.set_message(format!("{}: {} documents", report.name, report.documents));
        })
        .await;
    progress_bar.finish_with_message("Indexing completed");

    if args.format == "json" {
        return print_json(&outcome);
    }
    println!(
        "{} of {} sources indexed, {} failed, {} documents in {:.2}s{}",
        outcome.succeeded,
        outcome.total_sources,
        outcome.failed,
        outcome.total_documents,
        outcome.elapsed_secs,
        if outcome.cancelled { " (cancelled)" } else { "" }
    );
    for detail in &outcome.details {
        match &detail.error {
            Some(error) => println!("- {}: failed ({})", detail.name, error),
            None => println!("- {}: {} documents", detail.name, detail.documents),
        }
    }
    Ok(())
}

#[instrument(skip(service))]
async fn search_command(service: &Vectoria, args: &SearchArgs) -> anyhow::Result<()> {
    let options = vectoria::search::SearchOptions {
        limit: args.limit,
        source_filter: args.source.clone(),
    };
    let results = service.search_with(&args.query, &options).await?;

    match args.format.as_str() {
        "json" => print_json(&results)?,
        _ => {
            println!("Found {} results", results.len());
            for (i, result) in results.iter().enumerate() {
                println!("{}. {}", i + 1, result.title);
                println!("   Source: {}", result.source);
                println!("   Relevance: {:.1}%", result.score * 100.0);
                println!("   URL: {}", result.url);
                println!("   {}", result.snippet);
                println!();
            }
        }
    }
    Ok(())
}

#[instrument(skip(config))]
async fn crawl_command(config: CrawlerConfig, args: &CrawlArgs) -> anyhow::Result<()> {
    println!("Crawling {}...", args.url);
    let crawler = Crawler::new(config)?;
    let cancel = cancel_on_ctrl_c();
    let summary = crawler.crawl_site(&args.url, args.max_pages, &cancel).await?;

    println!(
        "Crawled {} pages, {} passed extraction",
        summary.visited,
        summary.pages.len()
    );
    for page in &summary.pages {
        println!("- {} ({} words) {}", page.title, page.word_count(), page.url);
    }

    // Save to file if output is specified
    if let Some(output_file) = &args.output {
        let json = serde_json::to_string_pretty(&summary.pages)?;
        tokio::fs::write(output_file, json).await?;
        println!("Saved crawled content to {}", output_file.display());
    }
    Ok(())
}

#[instrument(skip(service))]
async fn stats_command(service: &Vectoria, args: &FormatArgs) -> anyhow::Result<()> {
    let stats = service.stats().await;
    if args.format == "json" {
        return print_json(&stats);
    }

    println!("Sources: {} ({} active)", stats.total_sources, stats.active_sources);
    println!("Indexed sources: {}", stats.indexed_sources);
    println!("Documents: {}", stats.total_documents);
    println!("Categories:");
    for (category, count) in &stats.categories {
        println!("  {}: {}", category, count);
    }
    println!("Languages:");
    for (language, count) in &stats.languages {
        println!("  {}: {}", language, count);
    }
    Ok(())
}
