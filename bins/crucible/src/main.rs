use anyhow::Context;
use crucible_config::ExchangeConfig;
use crucible_engine::Coordinator;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            ExchangeConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => ExchangeConfig::default(),
    };

    // RUST_LOG wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let report = Coordinator::from_config(&config)?.run()?;

    info!(
        inserted = report.inserted,
        removed = report.removed,
        final_occupancy = report.final_occupancy,
        "exchange complete"
    );
    Ok(())
}
