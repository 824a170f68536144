use anyhow::Context;
use clap::Parser;
use skaz::config::load_config_with_hash;
use skaz::crawler::run_crawl;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "skaz", version, about = "Story-archive crawler")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (-q warnings only, -qq errors only)
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Validate the configuration and print the crawl plan without fetching
    #[arg(long)]
    dry_run: bool,
}

fn setup_logging(verbose: u8, quiet: u8) {
    let level = match verbose as i16 - quiet as i16 {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skaz={},warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    tracing::info!(
        "Loaded configuration {} (sha256 {})",
        cli.config.display(),
        &config_hash[..12]
    );

    if cli.dry_run {
        println!("Configuration OK");
        println!("  root url:            {}", config.site.root_url);
        println!("  max stories:         {}", config.crawler.max_stories);
        println!("  min content length:  {}", config.crawler.min_content_length);
        println!("  concurrent fetches:  {}", config.crawler.max_concurrent_fetches);
        println!("  per-host delay:      {} ms", config.crawler.per_host_delay_ms);
        println!("  records path:        {}", config.output.records_path);
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight work");
            let _ = stop_tx.send(true);
        }
    });

    let report = run_crawl(config, stop_rx).await?;

    println!("Crawl summary:");
    println!("  pages fetched:       {}", report.pages_fetched);
    println!("  stories accepted:    {}", report.accepted);
    println!("  stories rejected:    {}", report.rejected);
    println!("  incomplete stories:  {}", report.incomplete_stories);
    println!("  abandoned urls:      {}", report.abandoned_urls);

    Ok(())
}
