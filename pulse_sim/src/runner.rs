//! Tick thread: drives a [`TickContext`] at the intervals it asks for.
//!
//! With `time_scale > 0` each tick is paced on the wall clock and a tick
//! whose body outlasts its interval is reported as an overrun. With
//! `time_scale == 0` ticks run back to back. While the engine sleeps the
//! thread parks on the tick source.

use crate::hardware::SimTickSource;
use pulse_stepper::{PhaseEvents, Tick, TickContext, TickSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// How long a parked tick thread waits before re-checking for shutdown.
const PARK_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("RT setup failed: {0}")]
    RtSetup(String),
    #[error("tick thread panicked")]
    Panicked,
    #[error("failed to spawn tick thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub step_events: u64,
    pub max_body_ns: u64,
    pub total_body_ns: u64,
    pub overruns: u64,
    /// Times the thread parked on an idle engine.
    pub parks: u64,
    /// Step events per velocity phase.
    pub phases: PhaseEvents,
}

impl TickStats {
    #[inline]
    fn record(&mut self, body_ns: u64, tick: &Tick) {
        self.ticks += 1;
        self.step_events += tick.step_events as u64;
        self.phases.merge(&tick.phases);
        self.total_body_ns += body_ns;
        self.max_body_ns = self.max_body_ns.max(body_ns);
    }

    pub fn avg_body_ns(&self) -> u64 {
        self.total_body_ns.checked_div(self.ticks).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub timer_hz: u32,
    pub time_scale: f64,
    pub cpu_core: Option<usize>,
}

/// Handle to a running tick thread.
pub struct TickRunner {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Result<TickStats, RunnerError>>,
}

impl TickRunner {
    pub fn spawn(
        mut tick: TickContext,
        source: Arc<SimTickSource>,
        settings: RunnerSettings,
    ) -> Result<Self, RunnerError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = std::thread::Builder::new()
            .name("pulse-tick".to_string())
            .spawn(move || {
                rt_setup(settings.cpu_core)?;
                Ok(run_loop(&mut tick, &source, &flag, settings))
            })?;
        info!(time_scale = settings.time_scale, "tick thread started");
        Ok(Self { running, handle })
    }

    /// Shared flag; clearing it stops the thread.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn stop(self) -> Result<TickStats, RunnerError> {
        self.running.store(false, Ordering::Release);
        let stats = self.handle.join().map_err(|_| RunnerError::Panicked)??;
        info!(
            ticks = stats.ticks,
            step_events = stats.step_events,
            overruns = stats.overruns,
            max_body_ns = stats.max_body_ns,
            avg_body_ns = stats.avg_body_ns(),
            "tick thread stopped"
        );
        Ok(stats)
    }
}

fn run_loop(
    tick: &mut TickContext,
    source: &SimTickSource,
    running: &AtomicBool,
    settings: RunnerSettings,
) -> TickStats {
    let mut stats = TickStats::default();
    let ns_per_timer_tick = 1e9 / settings.timer_hz as f64 * settings.time_scale;
    let mut deadline = Instant::now();

    while running.load(Ordering::Acquire) {
        if !source.is_armed() {
            stats.parks += 1;
            source.wait_armed(PARK_TIMEOUT);
            deadline = Instant::now();
            continue;
        }

        let start = Instant::now();
        let out = tick.tick();
        let body = start.elapsed();
        stats.record(body.as_nanos() as u64, &out);

        if settings.time_scale > 0.0 {
            let period = Duration::from_nanos((out.interval as f64 * ns_per_timer_tick) as u64);
            if body > period {
                stats.overruns += 1;
                tick.record_overrun();
            }
            deadline += period;
            let now = Instant::now();
            match deadline.checked_duration_since(now) {
                Some(remaining) => std::thread::sleep(remaining),
                // best-effort catch-up: restart pacing from now
                None => deadline = now,
            }
        }
    }
    debug!(parks = stats.parks, "tick loop exited");
    stats
}

/// Lock memory and pin the tick thread.
#[cfg(feature = "rt")]
fn rt_setup(cpu_core: Option<usize>) -> Result<(), RunnerError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::sys::mman::{MlockallFlags, mlockall};
    use nix::unistd::Pid;

    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| RunnerError::RtSetup(format!("mlockall failed: {e}")))?;
    if let Some(cpu) = cpu_core {
        let mut cpuset = CpuSet::new();
        cpuset
            .set(cpu)
            .map_err(|e| RunnerError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
        sched_setaffinity(Pid::from_raw(0), &cpuset)
            .map_err(|e| RunnerError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    }
    info!(?cpu_core, "RT setup complete");
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_setup(_cpu_core: Option<usize>) -> Result<(), RunnerError> {
    Ok(()) // No-op without the rt feature
}
