// skystrike/server/src/main.rs
use skystrike_server_core::core::config::{self, SimConfig};
use skystrike_server_core::core::ticker::Ticker;
use skystrike_server_core::operational::monitoring::metrics;
use skystrike_server_core::server::instance::ArenaServer;

use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Some(location) = panic_info.location() {
            eprintln!("Location: {}:{}:{}", location.file(), location.line(), location.column());
        }
        eprintln!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
    }));

    metrics::init_logging()?;
    metrics::describe();
    let session_id = uuid::Uuid::new_v4();
    info!("Skystrike simulation core starting up (session {})...", session_id);

    let sim_config = match std::env::var("SKYSTRIKE_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            SimConfig::from_yaml_file(path)?
        }
        Err(_) => SimConfig::default(),
    };
    let shared_config = config::shared(sim_config);

    let mut server = ArenaServer::new(shared_config.clone())?;
    server.on_event("event_log", |event| {
        debug!("game event: {}", event.name());
    });
    info!("Arena server instance created.");

    // The connection layer (out of scope here) clones these handles to feed
    // intents and read broadcast sets.
    let _intent_sender = server.intent_sender();
    let _liveness = server.liveness_handle();

    let cfg = shared_config.load_full();
    let mut ticker = Ticker::new(cfg.tick_duration(), cfg.clock_reset_frames);
    drop(cfg);

    let stop = ticker.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received.");
        stop.stop();
    });

    server.run_game_loop(&mut ticker).await;

    info!("Skystrike simulation core shut down.");
    Ok(())
}
