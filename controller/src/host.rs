use alarmclock_common::{recurrence, AlarmConfig};
use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    actuator::Driver,
    cli::{Cli, LogFormat},
    clock::SystemClock,
    controller::AlarmController,
    error::AlarmError,
    fetch::HttpFetcher,
    metrics,
    resolver::Resolver,
    shutdown,
};

pub async fn run() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Ok(path) = dotenv {
        debug!("loaded environment from {}", path.display());
    }

    let config = AlarmConfig::from_env().context("invalid configuration")?;
    debug!(?config, "configuration loaded");

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(shutdown::listen_for_signals(trigger));

    if config.metrics_port != 0 {
        let port = config.metrics_port;
        let metrics_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = metrics::serve(port, metrics_shutdown).await {
                warn!("metrics server stopped: {err:#}");
            }
        });
    }

    let actuator = Driver::from_config(&config)?;
    info!(driver = actuator.name(), "actuator ready");

    let timing = config.timing();
    let fetcher = HttpFetcher::new(timing.fetch_timeout()).context("failed to build http client")?;
    let resolver = Resolver::new(
        fetcher,
        config.url.clone(),
        SystemClock,
        timing,
        recurrence::zone_from(config.timezone),
    );

    let controller = match AlarmController::start(resolver, actuator, shutdown).await {
        Ok(controller) => controller,
        Err(AlarmError::Interrupted) => {
            info!("shutdown before the first calendar load");
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to load calendar from {}", config.url))
        }
    };

    controller
        .run()
        .await
        .with_context(|| format!("failed to refresh calendar from {}", config.url))?;

    info!("alarm clock stopped");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_directive()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match cli.log_format {
        LogFormat::Full => builder.init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
