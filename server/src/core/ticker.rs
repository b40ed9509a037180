// skystrike/server/src/core/ticker.rs
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::constants::{FINE_WAIT_THRESHOLD, MAX_FRAMES_PER_TICK};

/// One executed tick, as seen by the simulation body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Monotonic tick counter, unaffected by clock resets.
    pub tick: u64,
    /// How many logical frames' worth of simulation this invocation must
    /// account for. Always >= 1.
    pub frame_factor: f64,
}

/// What the clock wants done next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickDecision {
    /// Not yet at the boundary. `coarse` selects the timer tier: a real sleep
    /// for long waits, an immediate yield for sub-threshold ones.
    Wait { coarse: bool, remaining: Duration },
    /// The pending tick spans more than `MAX_FRAMES_PER_TICK` logical frames;
    /// it is recorded as one more skipped frame and folded into the next
    /// tick's frame factor instead of being simulated in one oversized step.
    Fold,
    Run(Tick),
}

/// Pure scheduling arithmetic for the fixed-tick loop. Tracks a monotonic
/// start reference, the frames already delivered to the simulation and the
/// skipped frames pending delivery; never panics, never blocks.
///
/// Conservation: across any poll sequence, executed frame factors sum to the
/// logical frames actually elapsed (minus at most one frame still in flight),
/// regardless of scheduler jitter. Every executed factor is >= 1.
#[derive(Debug)]
pub struct FrameClock {
    interval: Duration,
    reset_frames: u64,
    start: Instant,
    /// Frames delivered to the simulation since `start` (sum of executed
    /// frame factors, minus whole frames shifted out at reset).
    accounted: f64,
    /// Skipped frames recorded by folds, delivered with the next executed
    /// frame factor.
    skipped: f64,
    /// Ticks executed or folded since the last reset.
    counter: u64,
    /// Total ticks executed; survives counter resets.
    tick: u64,
}

impl FrameClock {
    pub fn new(interval: Duration, reset_frames: u64, now: Instant) -> Self {
        FrameClock {
            interval,
            reset_frames: reset_frames.max(1),
            start: now,
            accounted: 0.0,
            skipped: 0.0,
            counter: 0,
            tick: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn poll(&mut self, now: Instant) -> TickDecision {
        let interval_s = self.interval.as_secs_f64();
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64() / interval_s;
        // Frames already claimed, whether delivered or folded.
        let claimed = self.accounted + self.skipped;

        if elapsed < claimed + 1.0 {
            let remaining = Duration::from_secs_f64((claimed + 1.0 - elapsed) * interval_s);
            return TickDecision::Wait { coarse: remaining > FINE_WAIT_THRESHOLD, remaining };
        }

        let pending = elapsed - claimed;
        if pending > MAX_FRAMES_PER_TICK {
            self.skipped += 1.0;
            self.counter += 1;
            return TickDecision::Fold;
        }

        let frame_factor = self.skipped + pending;
        self.accounted += frame_factor;
        self.skipped = 0.0;
        self.counter += 1;
        self.tick += 1;
        self.maybe_reset();
        TickDecision::Run(Tick { tick: self.tick, frame_factor })
    }

    /// Counter/reference reset at the very-long-uptime boundary. The reference
    /// shifts forward by the whole frames already delivered, so fractional
    /// progress and pending skipped frames are neither lost nor
    /// double-counted.
    fn maybe_reset(&mut self) {
        if self.counter >= self.reset_frames {
            let whole = self.accounted.floor();
            self.start += Duration::from_secs_f64(whole * self.interval.as_secs_f64());
            self.accounted -= whole;
            self.counter = 0;
        }
    }
}

pub struct TickerHandle {
    stopped: Arc<AtomicBool>,
}

impl TickerHandle {
    pub fn stop(&self) {
        self.stopped.store(true, AtomicOrdering::Relaxed);
    }
}

/// Async driver for `FrameClock`. Long waits use the coarse tokio timer;
/// waits under `FINE_WAIT_THRESHOLD` spin on `yield_now` to hit the boundary
/// with sub-millisecond precision without burning a core in a busy loop.
pub struct Ticker {
    clock: FrameClock,
    stopped: Arc<AtomicBool>,
}

impl Ticker {
    pub fn new(interval: Duration, reset_frames: u64) -> Self {
        Ticker {
            clock: FrameClock::new(interval, reset_frames, Instant::now()),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> TickerHandle {
        TickerHandle { stopped: self.stopped.clone() }
    }

    /// Drive `tick_fn` until stopped. A panicking tick body is caught and
    /// logged here; scheduling continues on the next boundary regardless.
    pub async fn run<F>(&mut self, mut tick_fn: F)
    where
        F: FnMut(Tick),
    {
        info!("Ticker started. Interval: {:?}", self.clock.interval());
        while !self.stopped.load(AtomicOrdering::Relaxed) {
            match self.clock.poll(Instant::now()) {
                TickDecision::Wait { coarse: true, remaining } => {
                    tokio::time::sleep(remaining).await;
                }
                TickDecision::Wait { coarse: false, .. } => {
                    tokio::task::yield_now().await;
                }
                TickDecision::Fold => continue,
                TickDecision::Run(tick) => {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| tick_fn(tick))) {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "non-string panic payload".into());
                        error!("Tick {} body panicked: {}", tick.tick, message);
                    }
                }
            }
        }
        info!("Ticker stopped after {} ticks.", self.clock.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(10);

    fn clock_at(start: Instant) -> FrameClock {
        FrameClock::new(INTERVAL, 1_000_000, start)
    }

    fn at(start: Instant, millis: f64) -> Instant {
        start + Duration::from_secs_f64(millis / 1000.0)
    }

    /// Poll until the clock has nothing left to run at `now`, collecting the
    /// executed frame factors.
    fn drain(clock: &mut FrameClock, now: Instant, factors: &mut Vec<f64>) {
        loop {
            match clock.poll(now) {
                TickDecision::Run(tick) => factors.push(tick.frame_factor),
                TickDecision::Fold => continue,
                TickDecision::Wait { .. } => break,
            }
        }
    }

    #[test]
    fn waits_before_the_boundary() {
        let start = Instant::now();
        let mut clock = clock_at(start);

        match clock.poll(start) {
            TickDecision::Wait { coarse, remaining } => {
                assert!(coarse);
                assert!(remaining <= INTERVAL);
            }
            other => panic!("expected Wait, got {:?}", other),
        }

        // Close to the boundary the fine-grained tier takes over.
        match clock.poll(at(start, 9.5)) {
            TickDecision::Wait { coarse, .. } => assert!(!coarse),
            other => panic!("expected Wait, got {:?}", other),
        }
    }

    #[test]
    fn runs_once_per_boundary_with_unit_factor() {
        let start = Instant::now();
        let mut clock = clock_at(start);

        for n in 1..=5u64 {
            match clock.poll(at(start, n as f64 * 10.0)) {
                TickDecision::Run(tick) => {
                    assert_eq!(tick.tick, n);
                    assert!((tick.frame_factor - 1.0).abs() < 1e-6);
                }
                other => panic!("expected Run, got {:?}", other),
            }
        }
    }

    #[test]
    fn late_invocation_compensates_in_one_run() {
        let start = Instant::now();
        let mut clock = clock_at(start);

        // 19.9ms elapsed: still a single tick, accounting for ~1.99 frames.
        match clock.poll(at(start, 19.9)) {
            TickDecision::Run(tick) => assert!((tick.frame_factor - 1.99).abs() < 1e-3),
            other => panic!("expected Run, got {:?}", other),
        }
        // Everything elapsed is claimed; nothing further to run yet.
        assert!(matches!(clock.poll(at(start, 19.9)), TickDecision::Wait { .. }));
    }

    #[test]
    fn oversized_tick_folds_into_next_factor() {
        let start = Instant::now();
        let mut clock = clock_at(start);

        assert!(matches!(clock.poll(at(start, 10.0)), TickDecision::Run(_)));
        assert!(matches!(clock.poll(at(start, 20.0)), TickDecision::Run(_)));

        // 25ms behind the last claim: > 2x interval, so the tick is folded.
        let now = at(start, 45.0);
        assert_eq!(clock.poll(now), TickDecision::Fold);
        match clock.poll(now) {
            TickDecision::Run(tick) => {
                // One folded skip plus the 1.5-frame remainder.
                assert!((tick.frame_factor - 2.5).abs() < 1e-6);
                assert_eq!(tick.tick, 3);
            }
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn frame_factors_conserve_elapsed_frames() {
        let start = Instant::now();
        let mut clock = clock_at(start);

        let mut factors = Vec::new();
        for millis in [10.0, 20.0, 47.0, 60.0, 99.9] {
            drain(&mut clock, at(start, millis), &mut factors);
        }

        for factor in &factors {
            assert!(*factor >= 1.0 - 1e-9, "frame factor {} below 1", factor);
        }
        // 99.9ms at 10ms per frame, fully claimed by the last drain.
        let accounted: f64 = factors.iter().sum();
        assert!((accounted - 9.99).abs() < 1e-3, "accounted {}", accounted);
    }

    #[test]
    fn reset_boundary_preserves_progress() {
        let start = Instant::now();
        // Reset every 4 executed/folded frames to cross the boundary often.
        let mut clock = FrameClock::new(INTERVAL, 4, start);

        let mut factors = Vec::new();
        let samples = [10.0, 20.0, 30.0, 41.5, 50.0, 63.0, 70.0, 80.0, 95.0, 100.0];
        for millis in samples {
            drain(&mut clock, at(start, millis), &mut factors);
        }

        for factor in &factors {
            assert!(*factor >= 1.0 - 1e-9, "frame factor {} below 1", factor);
        }
        // Whatever jitter and resets occurred, the delivered frames never
        // exceed the elapsed frames and lag them by less than 1.5 frames
        // (one in-flight boundary plus fractional residue).
        let accounted: f64 = factors.iter().sum();
        assert!(accounted <= 10.0 + 1e-9, "accounted {}", accounted);
        assert!(10.0 - accounted < 1.5, "accounted {}", accounted);
    }

    #[tokio::test]
    async fn ticker_stops_on_handle() {
        let mut ticker = Ticker::new(Duration::from_millis(1), 1_000_000);
        let handle = ticker.handle();
        let mut seen = 0u32;
        ticker
            .run(|_tick| {
                seen += 1;
                if seen >= 3 {
                    handle.stop();
                }
            })
            .await;
        assert!(seen >= 3);
    }
}
