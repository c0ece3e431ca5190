//! onion-harvest CLI - hidden service discovery and dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use onion_harvest::engines::{default_specs, EngineRegistry};
use onion_harvest::{
    server, HarvestConfig, HttpAnalysisSink, HttpQuerySource, LivenessProbe, PollLoop, Search,
    SearchQuery, TorTransport, Transport, WorkerLimit,
};

/// onion-harvest - Circuit-isolated onion search, fetch and dispatch
#[derive(Parser)]
#[command(name = "onion-harvest")]
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
    /// Run the poll loop and the control server
    Run(RunArgs),

    /// Search the onion engines once
    Search(SearchArgs),

    /// List the engine registry
    Engines(EnginesArgs),
}

/// Run settings. Unset options keep the value from `--config`, or the
/// built-in default.
#[derive(Args, Default)]
struct ConfigArgs {
    /// JSON file with a full or partial configuration
    #[arg(long, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file with an engine table replacing the built-in one
    #[arg(long, env = "ENGINES_FILE")]
    engines_file: Option<PathBuf>,

    /// SOCKS proxy host
    #[arg(long, env = "TOR_PROXY_HOST")]
    proxy_host: Option<String>,

    /// SOCKS proxy port
    #[arg(long, env = "TOR_PROXY_PORT")]
    proxy_port: Option<u16>,

    /// Concurrent network operations
    #[arg(long, env = "MAX_WORKERS")]
    max_workers: Option<usize>,

    /// Number of engines to use, in registry order
    #[arg(long, env = "NUM_ENGINES")]
    num_engines: Option<usize>,

    /// New URLs fetched per query
    #[arg(long, env = "SCRAPE_LIMIT")]
    scrape_limit: Option<usize>,

    /// Pages per analysis batch
    #[arg(long, env = "BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Seconds between poll cycles
    #[arg(long, env = "POLL_INTERVAL_SECONDS")]
    poll_interval: Option<u64>,

    /// Query generation service
    #[arg(long, env = "QUERY_SERVICE_URL")]
    query_service_url: Option<String>,

    /// Analysis service
    #[arg(long, env = "ANALYSIS_SERVICE_URL")]
    analysis_service_url: Option<String>,

    /// Per-attempt engine search timeout in seconds
    #[arg(long, env = "SEARCH_TIMEOUT_SECONDS")]
    search_timeout: Option<u64>,

    /// Liveness probe timeout in seconds
    #[arg(long, env = "LIVENESS_TIMEOUT_SECONDS")]
    liveness_timeout: Option<u64>,

    /// Per-attempt page fetch timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECONDS")]
    fetch_timeout: Option<u64>,

    /// Timeout of query and analysis service calls in seconds
    #[arg(long, env = "SERVICE_TIMEOUT_SECONDS")]
    service_timeout: Option<u64>,

    /// Retries of a timed-out engine search
    #[arg(long, env = "SEARCH_RETRIES")]
    search_retries: Option<u32>,

    /// Retries of a timed-out page fetch
    #[arg(long, env = "FETCH_RETRIES")]
    fetch_retries: Option<u32>,

    /// Retries of a refused batch
    #[arg(long, env = "DISPATCH_RETRIES")]
    dispatch_retries: Option<u32>,

    /// Base backoff between retries in milliseconds
    #[arg(long, env = "RETRY_BACKOFF_MS")]
    retry_backoff_ms: Option<u64>,

    /// Seconds an in-flight query may run after shutdown is requested
    #[arg(long, env = "GRACE_PERIOD_SECONDS")]
    grace_period: Option<u64>,

    /// Control server address
    #[arg(long, env = "CONTROL_ADDR")]
    control_addr: Option<String>,

    /// Attach the source's match strings to every batch
    #[arg(long, env = "ATTACH_SEARCH_STRINGS")]
    attach_search_strings: bool,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl ConfigArgs {
    fn into_config(self) -> Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => read_json(path)?,
            None => HarvestConfig::default(),
        };
        if let Some(path) = &self.engines_file {
            config.engines = read_json(path)?;
        }

        set(&mut config.proxy_host, self.proxy_host);
        set(&mut config.proxy_port, self.proxy_port);
        set(&mut config.max_workers, self.max_workers);
        set(&mut config.num_engines, self.num_engines);
        set(&mut config.scrape_limit, self.scrape_limit);
        set(&mut config.batch_size, self.batch_size);
        set(&mut config.poll_interval_secs, self.poll_interval);
        set(&mut config.query_service_url, self.query_service_url);
        set(&mut config.analysis_service_url, self.analysis_service_url);
        set(&mut config.search_timeout_secs, self.search_timeout);
        set(&mut config.liveness_timeout_secs, self.liveness_timeout);
        set(&mut config.fetch_timeout_secs, self.fetch_timeout);
        set(&mut config.service_timeout_secs, self.service_timeout);
        set(&mut config.transport_retries, self.search_retries);
        set(&mut config.fetch_retries, self.fetch_retries);
        set(&mut config.dispatch_retries, self.dispatch_retries);
        set(&mut config.retry_backoff_ms, self.retry_backoff_ms);
        set(&mut config.grace_period_secs, self.grace_period);
        set(&mut config.control_addr, self.control_addr);
        config.attach_search_strings |= self.attach_search_strings;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Exit once the loop stops instead of keeping the control server up
    #[arg(long)]
    exit_when_done: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    #[command(flatten)]
    config: ConfigArgs,

    /// Probe every result and keep live ones only
    #[arg(short, long)]
    check: bool,

    /// Maximum number of results to display
    #[arg(short, long, default_value = "50")]
    limit: usize,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
struct EnginesArgs {
    /// Number of engines to list
    #[arg(long, env = "NUM_ENGINES")]
    num_engines: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("onion_harvest=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Search(args) => run_search(args).await,
        Commands::Engines(args) => list_engines(args),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.config.into_config()?;
    let control_addr = config.control_socket()?;
    let transport = Arc::new(TorTransport::from_config(&config));
    if !transport.probe_proxy().await {
        warn!("Proxy {} is not reachable yet", config.proxy_address());
    }

    let source = Arc::new(HttpQuerySource::new(
        &config.query_service_url,
        config.service_timeout(),
    )?);
    let sink = Arc::new(HttpAnalysisSink::new(
        &config.analysis_service_url,
        config.service_timeout(),
    )?);

    let poll = PollLoop::new(config, transport, source, sink)?;
    let handle = poll.handle();
    let cancel = CancellationToken::new();

    let server = tokio::spawn(server::serve(control_addr, handle, cancel.clone()));
    let mut poll_task = tokio::spawn(poll.run(cancel.clone()));

    let status = tokio::select! {
        status = &mut poll_task => Some(status?),
        _ = tokio::signal::ctrl_c() => None,
    };

    let status = match status {
        Some(status) => {
            info!("Poll loop finished in state {}", status.state);
            if !args.exit_when_done {
                info!("Control server stays up, press Ctrl-C to exit");
                tokio::signal::ctrl_c().await?;
            }
            cancel.cancel();
            status
        }
        None => {
            info!("Shutting down");
            cancel.cancel();
            poll_task.await?
        }
    };

    server.await??;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let config = args.config.into_config()?;
    let transport: Arc<dyn Transport> = Arc::new(TorTransport::from_config(&config));
    let limit = WorkerLimit::new(config.max_workers);

    let search = Search::new(
        EngineRegistry::from_config(&config),
        Arc::clone(&transport),
        limit.clone(),
    )
    .with_retry(config.transport_retry());
    let results = search.search(&SearchQuery::new(&args.query)).await?;

    let mut urls = results.items().to_vec();
    if args.check {
        let probe = LivenessProbe::new(transport, limit, config.liveness_timeout());
        urls = probe.filter(urls).await?.live;
    }
    urls.truncate(args.limit);

    match args.format {
        OutputFormat::Text => {
            println!(
                "\nOnion results for \"{}\" ({} URLs in {}ms):\n",
                args.query,
                results.len(),
                results.duration_ms
            );
            for (i, url) in urls.iter().enumerate() {
                println!("{}. {}", i + 1, url.url);
                println!("   Engine: {}", url.engine);
            }
            if !results.failed_engines.is_empty() {
                println!("\nFailed engines: {}", results.failed_engines.join(", "));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&urls)?);
        }
        OutputFormat::Compact => {
            for url in &urls {
                println!("{}\t{}", url.engine, url.url);
            }
        }
    }

    Ok(())
}

fn list_engines(args: EnginesArgs) -> Result<()> {
    let num_engines = args
        .num_engines
        .unwrap_or(HarvestConfig::default().num_engines);
    println!("Onion search engines (in registry order):\n");
    for (i, spec) in default_specs().iter().enumerate() {
        let marker = if i < num_engines { "*" } else { " " };
        println!("  {} {:<10} - {}", marker, spec.shortcut, spec.name);
    }
    println!();
    println!("* = used with NUM_ENGINES={}", num_engines);
    println!("Usage: onion-harvest search \"query\" --check");
    Ok(())
}
