use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use shopscrape::config::{AppConfig, Backend, ConfigOverrides, CoordinateMode};
use shopscrape::core::Orchestrator;
use shopscrape::logging::init_logging;
use shopscrape::scraper::browser::BrowserSessionFactory;
use shopscrape::scraper::http_client::HttpClient;
use shopscrape::scraper::static_page::StaticSessionFactory;
use shopscrape::scraper::SessionFactory;
use shopscrape::utils::read_target_file;

#[derive(Parser)]
#[command(name = "shopscrape")]
#[command(about = "Scrape product pages into JSON and spreadsheet files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape product pages by identifier
    Run {
        #[arg(help = "Product identifiers")]
        ids: Vec<String>,

        #[arg(long, help = "File with one identifier per line, '#' starts a comment")]
        targets_file: Option<PathBuf>,

        #[arg(short, long, help = "Number of concurrent sessions")]
        workers: Option<usize>,

        #[arg(long, value_enum, help = "How coordinated items are visited")]
        mode: Option<CoordinateMode>,

        #[arg(long, help = "Skip ratings and reviews")]
        no_reviews: bool,

        #[arg(long, value_enum, help = "Page backend")]
        backend: Option<Backend>,
    },

    /// Collect product identifiers from listing pages
    Discover {
        #[arg(short, long, default_value_t = 1, help = "Number of listing pages")]
        pages: u32,

        #[arg(short, long, help = "Write identifiers to this file instead of stdout")]
        output: Option<PathBuf>,

        #[arg(long, value_enum, help = "Page backend")]
        backend: Option<Backend>,
    },

    /// Show the effective configuration
    Config {
        #[arg(long, help = "Write the configuration file")]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path).await?,
        None => AppConfig::load().await?,
    };
    ConfigOverrides::apply(&mut config);
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    init_logging(&config.logging)?;
    info!("shopscrape v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { ids, targets_file, workers, mode, no_reviews, backend } => {
            if let Some(workers) = workers {
                config.scraping.workers = workers;
            }
            if let Some(mode) = mode {
                config.scraping.coordinate_mode = mode;
            }
            if no_reviews {
                config.scraping.include_reviews = false;
            }
            if let Some(backend) = backend {
                config.scraping.backend = backend;
            }
            config.validate()?;

            let targets = collect_targets(&config, ids, targets_file).await?;
            if targets.is_empty() {
                anyhow::bail!("No targets given: pass identifiers, --targets-file, or set `targets` in the config");
            }

            let orchestrator = Orchestrator::new(config);
            match orchestrator.config().scraping.backend {
                Backend::Static => {
                    let factory = StaticSessionFactory::new(&orchestrator.config().scraping)?;
                    let result = execute_run(&orchestrator, &factory, &targets).await;
                    log_http_stats(factory.client());
                    result?;
                }
                Backend::Browser => {
                    let factory = BrowserSessionFactory::new(&orchestrator.config().scraping).await?;
                    execute_run(&orchestrator, &factory, &targets).await?;
                }
            }
        }
        Commands::Discover { pages, output, backend } => {
            if let Some(backend) = backend {
                config.scraping.backend = backend;
            }
            config.validate()?;

            let orchestrator = Orchestrator::new(config);
            let ids = match orchestrator.config().scraping.backend {
                Backend::Static => {
                    let factory = StaticSessionFactory::new(&orchestrator.config().scraping)?;
                    let ids = orchestrator.discover(&factory, pages).await;
                    log_http_stats(factory.client());
                    ids?
                }
                Backend::Browser => {
                    let factory = BrowserSessionFactory::new(&orchestrator.config().scraping).await?;
                    orchestrator.discover(&factory, pages).await?
                }
            };

            match output {
                Some(path) => {
                    let mut content = ids.join("\n");
                    content.push('\n');
                    tokio::fs::write(&path, content)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {} identifiers to {}", ids.len(), path.display());
                }
                None => {
                    for id in &ids {
                        println!("{}", id);
                    }
                }
            }
        }
        Commands::Config { init } => {
            if init {
                let path = config.save(cli.config.as_deref()).await?;
                println!("Configuration written to {}", path.display());
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Arguments first, then the targets file; the config list only when both are empty
async fn collect_targets(config: &AppConfig, ids: Vec<String>, targets_file: Option<PathBuf>) -> Result<Vec<String>> {
    let mut targets: Vec<String> = ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    if let Some(path) = targets_file {
        targets.extend(read_target_file(&path).await?);
    }

    if targets.is_empty() {
        targets = config.targets.clone();
    }

    Ok(targets)
}

async fn execute_run<F: SessionFactory>(orchestrator: &Orchestrator, factory: &F, targets: &[String]) -> Result<()> {
    info!("Running {} targets on the {} backend", targets.len(), factory.name());

    let report = orchestrator.run(factory, targets).await?;

    for failure in &report.failures {
        warn!("{} [{}]: {}", failure.target, failure.category, failure.message);
    }
    for sink_error in &report.export.failures {
        error!("{}", sink_error);
    }
    for stats in &report.export.stats {
        println!("{}: {} records -> {} ({} bytes)", stats.sink, stats.record_count, stats.file_path, stats.file_size_bytes);
    }

    println!("Run {}: {}", report.run_id, report.summary());

    if !report.export.is_complete() {
        anyhow::bail!("{} sink(s) failed", report.export.failures.len());
    }
    Ok(())
}

fn log_http_stats(client: &HttpClient) {
    let stats = client.stats();
    info!(
        requests = stats.total_requests,
        errors = stats.error_count,
        bytes = stats.total_bytes,
        avg_ms = stats.avg_response_time.as_millis() as u64,
        "HTTP totals"
    );
}
