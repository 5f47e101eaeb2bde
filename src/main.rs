use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use event_scraper::app::ports::ProcessedLedger;
use event_scraper::config::Config;
use event_scraper::crawl::{CrawlOrchestrator, CrawlOutcome};
use event_scraper::infra::{InMemoryLedger, ReqwestHttp, SqliteLedger, TermListMatcher};
use event_scraper::logging;
use event_scraper::observability::metrics;
use event_scraper::pipeline::NormalizationPipeline;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

#[derive(Parser)]
#[command(name = "event_scraper")]
#[command(about = "Structured event extraction for venue and ticketing pages")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $EVENT_SCRAPER_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the Prometheus metrics snapshot before exiting
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl invocation for a configured source
    Crawl {
        /// The source's flow_id
        #[arg(long)]
        source: String,
    },
    /// Run one crawl invocation per enabled source, in config order
    CrawlAll,
    /// Probe the extractors (and section finder) against a saved page
    Extract {
        #[arg(long)]
        file: PathBuf,
        /// URL the page was saved from, used to resolve relative links
        #[arg(long)]
        url: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("loading configuration")
}

fn build_orchestrator(config: &Config) -> Result<CrawlOrchestrator> {
    let ledger: Arc<dyn ProcessedLedger> = match &config.ledger.path {
        Some(path) => Arc::new(
            SqliteLedger::open(path).with_context(|| format!("opening ledger at {}", path.display()))?,
        ),
        None => {
            warn!("no [ledger] path configured; processed marks will not persist");
            Arc::new(InMemoryLedger::new())
        }
    };
    let pipeline = NormalizationPipeline::new(ledger, Arc::new(TermListMatcher))
        .with_venue_resolver(Arc::new(config.venue_resolver()?))
        .with_reference_zone(config.reference_zone());
    let http = Arc::new(ReqwestHttp::new(config.user_agent()));
    Ok(CrawlOrchestrator::new(http, config.fetch_options(), pipeline).with_max_pages(config.crawl.max_pages))
}

fn print_outcome(flow_id: &str, outcome: &CrawlOutcome) -> Result<()> {
    let mut json = serde_json::to_value(outcome)?;
    json["flow_id"] = serde_json::Value::String(flow_id.to_string());
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn run_crawl(orchestrator: &CrawlOrchestrator, config: &Config, flow_id: &str) -> Result<CrawlOutcome> {
    let source = config
        .source(flow_id)
        .ok_or_else(|| anyhow!("no source with flow_id '{}' in config", flow_id))?;
    let job_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("crawl", flow_id = %flow_id, job_id = %job_id);

    info!(parent: &span, "starting crawl of {}", source.source_url);
    let outcome = orchestrator
        .crawl(&source.to_flow(Some(&job_id)))
        .instrument(span)
        .await?;
    Ok(outcome)
}

async fn run_extract(config: &Config, file: &Path, url: &str) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let pipeline = NormalizationPipeline::new(Arc::new(InMemoryLedger::new()), Arc::new(TermListMatcher))
        .with_reference_zone(config.reference_zone());
    let http = Arc::new(ReqwestHttp::new(config.user_agent()));
    let orchestrator = CrawlOrchestrator::new(http, config.fetch_options(), pipeline);

    match orchestrator.registry().extract(&content, url).await {
        Some(result) => {
            let report = serde_json::json!({
                "method": result.method,
                "count": result.events.len(),
                "events": result.events,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => {
            let sections = orchestrator
                .section_finder()
                .candidates(&content, url, orchestrator.today());
            println!("No extractor matched; {} candidate sections", sections.len());
            for section in sections.iter().take(5) {
                let preview: String = section.content.chars().take(160).collect();
                println!("[{}] {}", section.rule.as_str(), preview);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    let prometheus = match metrics::init() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("metrics disabled: {}", e);
            None
        }
    };

    match &cli.command {
        Commands::Crawl { source } => {
            let config = load_config(cli.config.as_deref())?;
            let orchestrator = build_orchestrator(&config)?;
            let outcome = run_crawl(&orchestrator, &config, source).await?;
            print_outcome(source, &outcome)?;
        }
        Commands::CrawlAll => {
            let config = load_config(cli.config.as_deref())?;
            let orchestrator = build_orchestrator(&config)?;
            for source in config.enabled_sources() {
                match run_crawl(&orchestrator, &config, &source.flow_id).await {
                    Ok(outcome) => print_outcome(&source.flow_id, &outcome)?,
                    Err(e) => error!("crawl of {} failed: {:#}", source.flow_id, e),
                }
            }
        }
        Commands::Extract { file, url } => {
            let config = match load_config(cli.config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    warn!("using default settings: {:#}", e);
                    Config::default()
                }
            };
            run_extract(&config, file, url).await?;
        }
    }

    if cli.metrics {
        if let Some(handle) = prometheus {
            println!("{}", handle.render());
        }
    }
    Ok(())
}
