use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pricewatch::application::{PriceMonitor, Supervisor};
use pricewatch::domain::price::PriceFetcher;
use pricewatch::infrastructure::{ChangeLog, HttpPriceSource, Notifier, WebhookNotifier};
use pricewatch::shared::config::{Config, DEFAULT_CONFIG_PATH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Watch market item prices, log every change and alert on large moves")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for per-item change logs (overrides config)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Seconds between two passes over all items (overrides config)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Minimum change in EUR that sends a notification (overrides config)
    #[arg(long)]
    threshold: Option<f64>,

    /// Notification webhook URL (overrides config)
    #[arg(long, env = "PRICEWATCH_WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut cfg = Config::from_file(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;

    // CLI > config file > defaults
    if let Some(log_dir) = &args.log_dir {
        cfg.log_dir = log_dir.clone();
    }
    if let Some(interval_secs) = args.interval_secs {
        cfg.check_interval_secs = interval_secs;
    }
    if let Some(threshold) = args.threshold {
        cfg.alert.threshold = threshold;
    }
    if let Some(webhook_url) = &args.webhook_url {
        cfg.webhook_url = Some(webhook_url.clone());
    }

    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

fn log_startup(cfg: &Config) {
    info!("🚀 Starting pricewatch v{}", env!("CARGO_PKG_VERSION"));
    info!("📊 Watching {} items every {}s", cfg.items.len(), cfg.check_interval_secs);
    info!("🔔 Notification threshold: {:.2} €", cfg.alert.threshold);
    info!("📝 Change logs in {}", cfg.log_dir.display());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let cfg = load_config(&args)?;
    log_startup(&cfg);

    let fetch_config = cfg.fetch_config()?;
    let source = HttpPriceSource::new(fetch_config.timeout).context("build price client")?;
    let notifier: Arc<dyn Notifier> = Arc::new(
        WebhookNotifier::new(
            cfg.webhook_url().to_string(),
            cfg.alert.error_title.clone(),
            fetch_config.timeout,
        )
        .context("build webhook client")?,
    );

    let monitor = PriceMonitor::new(
        cfg.monitor_config()?,
        PriceFetcher::new(Arc::new(source), fetch_config),
        ChangeLog::new(cfg.log_dir.clone()),
        Arc::clone(&notifier),
    );
    let supervisor = Supervisor::new(Arc::new(monitor), notifier, cfg.supervisor_config());

    let err = supervisor.run().await;
    Err(err.context("price monitor stopped"))
}
