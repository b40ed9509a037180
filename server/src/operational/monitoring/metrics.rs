// skystrike/server/src/operational/monitoring/metrics.rs
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use anyhow::{Context, Result};

/// Describe every metric the core emits. Exporter installation (Prometheus or
/// otherwise) is the embedder's concern; the core only records through the
/// `metrics` facade.
pub fn describe() {
    describe_counter!("sim_ticks_total", "Total simulation ticks executed");
    describe_counter!("sim_tick_overruns_total", "Ticks whose execution exceeded the logical interval");
    describe_gauge!("sim_players_connected", "Number of connected players");
    describe_histogram!("sim_tick_seconds", "Tick execution time in seconds");
}

pub fn record_tick(seconds: f64, players: usize) {
    histogram!("sim_tick_seconds").record(seconds);
    counter!("sim_ticks_total").increment(1);
    gauge!("sim_players_connected").set(players as f64);
}

pub fn record_overrun() {
    counter!("sim_tick_overruns_total").increment(1);
}

// Logging setup
pub fn init_logging() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skystrike_server_core=info,warn".into()),
        )
        .with(fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
