// skystrike/server/src/server/game_loop.rs
use super::instance::ArenaServer;
use crate::core::ticker::Ticker;
use crate::operational::monitoring::metrics;
use std::time::Instant;
use tracing::{info, warn};

impl ArenaServer {
    /// Drive the simulation until the ticker is stopped. One logical tick
    /// runs to completion before the next timer callback is allowed to fire;
    /// there is no parallel mutation of any simulation state.
    ///
    /// A tick whose wall-clock execution exceeds the logical interval is
    /// logged and counted — an operational alarm, not a correctness bug,
    /// since all simulation math is frame-factor based.
    pub async fn run_game_loop(&mut self, ticker: &mut Ticker) {
        let interval = self.config().load().tick_duration();
        info!("Game loop started. Tick interval: {:?}", interval);

        ticker
            .run(|tick| {
                let started = Instant::now();
                self.run_tick(tick);
                let elapsed = started.elapsed();

                metrics::record_tick(elapsed.as_secs_f64(), self.world.players.len());
                if elapsed > interval {
                    metrics::record_overrun();
                    warn!(
                        "Tick {} exceeded its budget: {:?} (interval {:?}, frame factor {:.2})",
                        tick.tick, elapsed, interval, tick.frame_factor
                    );
                }
            })
            .await;

        info!("Game loop stopped after {} ticks.", self.world.tick);
    }
}
