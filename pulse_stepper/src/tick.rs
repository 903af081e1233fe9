//! The periodic tick: quick-stop check, babysteps, endstop sampling,
//! Bresenham step events, next interval, block hand-over.
//!
//! [`TickContext::tick`] is the whole real-time path. It never blocks,
//! never allocates, never logs and runs a bounded amount of work: at most
//! four step events and at most one queue drain of fixed capacity.

use crate::context::Shared;
use crate::lifecycle::TickSource;
use crate::port::PortTable;
use crate::queue::Queued;
use crate::safety::endstops::{EndstopAction, EndstopInputs, EndstopMonitor};
use crate::step::bresenham::{AxisMask, Bresenham};
use crate::step::profile::{Phase, PhaseEvents, Trapezoid};
use crate::step::timer::IntervalTimer;
use pulse_common::axis::{Axis, AxisArray};
use pulse_common::block::Block;
use pulse_common::consts::{BLOCK_BUFFER_SIZE, NUM_AXIS};
use pulse_common::machine::StepperConfig;
use std::sync::Arc;

/// What one tick did, and when the next one is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tick {
    /// Timer ticks until the next tick.
    pub interval: u32,
    /// Step events executed.
    pub step_events: u8,
    /// Pulses emitted per axis by step events (babysteps excluded).
    pub pulses: AxisArray<u8>,
    /// Step events per velocity phase.
    pub phases: PhaseEvents,
    /// Axes that received a babystep.
    pub babysteps: AxisMask,
    /// The executing block ran out of step events.
    pub block_finished: bool,
    /// Blocks discarded by a quick-stop.
    pub discarded: u32,
    /// No block is loaded after this tick.
    pub idle: bool,
}

/// The block being executed and its per-block state.
#[derive(Debug)]
struct Current {
    seq: u64,
    block: Block,
    bresenham: Bresenham,
    profile: Trapezoid,
    step_loops: u8,
    /// Axes stopped by a homing contact.
    halted: AxisMask,
}

/// Tick-context state. Owned by whatever drives the step timer.
pub struct TickContext {
    shared: Arc<Shared>,
    tick_source: Arc<dyn TickSource>,
    ports: PortTable,
    endstops: Box<dyn EndstopInputs>,
    monitor: EndstopMonitor,
    timer: IntervalTimer,
    idle_interval: u32,
    current: Option<Current>,
    handled_cutoff: u64,
}

impl TickContext {
    pub(crate) fn new(
        config: &StepperConfig,
        shared: Arc<Shared>,
        tick_source: Arc<dyn TickSource>,
        ports: PortTable,
        endstops: Box<dyn EndstopInputs>,
    ) -> Self {
        let handled_cutoff = shared.stop.cutoff();
        Self {
            shared,
            tick_source,
            ports,
            endstops,
            monitor: EndstopMonitor::new(&config.endstops),
            timer: IntervalTimer::new(&config.timer),
            idle_interval: config.timer.idle_interval_ticks,
            current: None,
            handled_cutoff,
        }
    }

    /// Run one tick.
    pub fn tick(&mut self) -> Tick {
        let mut out = Tick::default();

        let cutoff = self.shared.stop.cutoff();
        if cutoff > self.handled_cutoff {
            self.quick_stop(cutoff, &mut out);
        }

        self.apply_babysteps(&mut out);

        if self.current.is_none() {
            self.load_next();
        }

        if self.current.is_some() {
            self.run_block(&mut out);
        }

        if self.current.is_none() {
            match self.load_next() {
                Some(interval) => out.interval = interval,
                None => {
                    out.idle = true;
                    out.interval = self.idle_interval;
                    self.park();
                }
            }
        }

        self.shared.faults.record_tick(out.step_events as u32);
        out
    }

    /// Report a tick that completed after its deadline.
    pub fn record_overrun(&self) {
        self.shared.faults.record_overrun();
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// The executing block, if any.
    pub fn current_block(&self) -> Option<&Block> {
        self.current.as_ref().map(|c| &c.block)
    }

    /// Step events completed in the executing block.
    pub fn events_completed(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.bresenham.events_completed())
    }

    // ─── Block hand-over ────────────────────────────────────────────

    /// Dequeue the next live block. Returns the interval to its first event.
    fn load_next(&mut self) -> Option<u32> {
        for _ in 0..BLOCK_BUFFER_SIZE {
            let entry = self.shared.queue.pop()?;
            if entry.seq < self.handled_cutoff || entry.block.step_event_count() == 0 {
                self.shared.queue.retire();
                continue;
            }
            return Some(self.install(entry));
        }
        None
    }

    fn install(&mut self, entry: Queued) -> u32 {
        let block = entry.block;
        let mut profile = Trapezoid::new(&block, self.timer.frequency(), self.timer.min_step_rate());
        self.timer.invalidate();
        let interval = self.timer.interval_for(profile.rate());
        if interval.reseeded {
            self.shared.faults.record_reseed();
        }
        if interval.clamped {
            self.shared.faults.record_rate_clamp();
        }
        profile.elapse(0, interval.ticks);
        self.ports.set_directions(&block);
        self.current = Some(Current {
            seq: entry.seq,
            block,
            bresenham: Bresenham::new(&block),
            profile,
            step_loops: interval.step_loops,
            halted: AxisMask::empty(),
        });
        interval.ticks
    }

    /// Retire the executing block.
    fn finish_current(&mut self, cut_short: bool) {
        let Some(done) = self.current.take() else {
            return;
        };
        self.shared.queue.retire();
        if !cut_short
            && done.block.exit_rate() > self.timer.min_step_rate()
            && self.shared.queue.pending() == 0
        {
            self.shared.faults.record_underrun();
        }
    }

    /// Quick-stop. A block that survives the drain is already loaded, so
    /// its first interval is the next one.
    fn quick_stop(&mut self, cutoff: u64, out: &mut Tick) {
        let (dropped, kept) = self.discard_before(cutoff);
        out.discarded += dropped;
        if let Some(interval) = kept {
            out.interval = interval;
        }
    }

    /// Drop pending babysteps, the executing block and every queued block
    /// older than `cutoff`. A newer block found while draining becomes
    /// current; its first interval is returned.
    fn discard_before(&mut self, cutoff: u64) -> (u32, Option<u32>) {
        self.handled_cutoff = self.handled_cutoff.max(cutoff);
        self.shared.babysteps.clear();
        let mut dropped = 0;
        if self.current.as_ref().is_some_and(|c| c.seq < cutoff) {
            self.current = None;
            self.shared.queue.retire();
            dropped += 1;
        }
        let mut interval = None;
        if self.current.is_none() {
            let (count, kept) = self.shared.queue.discard_before(cutoff);
            dropped += count;
            interval = kept.map(|entry| self.install(entry));
        }
        (dropped, interval)
    }

    /// Disarm the tick source unless work arrived meanwhile.
    fn park(&mut self) {
        self.tick_source.disarm();
        // a producer may have enqueued between our dequeue and the disarm
        if self.shared.queue.pending() > 0
            || self.shared.babysteps.any_pending()
            || self.shared.stop.cutoff() > self.handled_cutoff
        {
            self.tick_source.arm();
        }
    }

    // ─── Execution ──────────────────────────────────────────────────

    fn run_block(&mut self, out: &mut Tick) {
        if self.sample_endstops(out) {
            return;
        }
        let Some(cur) = self.current.as_mut() else {
            return;
        };

        let context = &self.shared.context;
        let dual_axis = context.dual_axis();
        let extruder = cur.block.active_extruder();
        let mut deltas = [0i32; NUM_AXIS];

        for _ in 0..cur.step_loops {
            if cur.bresenham.is_done() {
                break;
            }
            let phase: Phase = cur.profile.phase_at(cur.bresenham.events_completed());
            let pulses = cur.bresenham.step();
            out.phases.add(phase);
            out.step_events += 1;

            for axis in Axis::ALL {
                if !pulses.has(axis) || cur.halted.has(axis) {
                    continue;
                }
                let locked = if dual_axis == Some(axis) {
                    context.locked_mask()
                } else {
                    0
                };
                if self.ports.pulse(axis, extruder, locked) {
                    let i = axis.index();
                    deltas[i] += if cur.block.is_negative(axis) { -1 } else { 1 };
                    out.pulses[i] += 1;
                }
            }
        }

        for axis in Axis::ALL {
            self.shared.position.advance(axis, deltas[axis.index()]);
        }

        if cur.bresenham.is_done() {
            debug_assert!(Axis::ALL.iter().all(|&axis| cur.bresenham.remaining(axis) == 0));
            out.block_finished = true;
            self.finish_current(false);
            return;
        }

        let completed = cur.bresenham.events_completed();
        let rate = cur.profile.next_rate(completed);
        let interval = self.timer.interval_for(rate);
        if interval.clamped {
            self.shared.faults.record_rate_clamp();
        }
        if interval.reseeded {
            self.shared.faults.record_reseed();
        }
        cur.step_loops = interval.step_loops;
        cur.profile.elapse(completed, interval.ticks);
        out.interval = interval.ticks;
    }

    /// Sample the switches ahead of the block. True if the block is gone.
    fn sample_endstops(&mut self, out: &mut Tick) -> bool {
        let shared = &self.shared;
        if !shared.context.endstops_enabled() {
            return false;
        }
        let Some(cur) = self.current.as_mut() else {
            return false;
        };
        let triggered = self.monitor.sample(
            self.endstops.as_mut(),
            &cur.block,
            cur.halted,
            shared.context.dual_axis(),
        );
        let action = self
            .monitor
            .react(triggered, &shared.context, &shared.position, &shared.hits);

        match action {
            EndstopAction::Continue => false,
            EndstopAction::Abort => {
                shared.faults.record_endstop_abort();
                let cutoff = shared.queue.next_seq();
                shared.stop.request(cutoff);
                self.quick_stop(cutoff, out);
                true
            }
            EndstopAction::EndBlock => {
                self.finish_current(true);
                out.block_finished = true;
                true
            }
            EndstopAction::Halt(axes) => {
                cur.halted |= axes;
                let moving = Axis::ALL
                    .into_iter()
                    .filter(|&axis| cur.block.moves(axis))
                    .all(|axis| cur.halted.has(axis));
                if moving {
                    self.finish_current(true);
                    out.block_finished = true;
                    return true;
                }
                false
            }
        }
    }

    /// At most one pending babystep per axis, then restore block direction.
    fn apply_babysteps(&mut self, out: &mut Tick) {
        let requests = &self.shared.babysteps;
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let Some(forward) = requests.take(axis) else {
                continue;
            };
            let locked = if self.shared.context.dual_axis() == Some(axis) {
                self.shared.context.locked_mask()
            } else {
                0
            };
            let (extruder, restore) = match &self.current {
                Some(cur) => (
                    cur.block.active_extruder(),
                    cur.block.moves(axis).then(|| cur.block.is_negative(axis)),
                ),
                None => (0, None),
            };
            self.ports.set_direction(axis, extruder, !forward);
            self.ports.pulse(axis, extruder, locked);
            if let Some(negative) = restore {
                self.ports.set_direction(axis, extruder, negative);
            }
            out.babysteps |= AxisMask::for_axis(axis);
        }
    }
}

impl std::fmt::Debug for TickContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickContext")
            .field("current", &self.current.as_ref().map(|c| c.seq))
            .field("handled_cutoff", &self.handled_cutoff)
            .field("ports", &self.ports)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{ManualTickSource, Stepper, init};
    use crate::port::PortLogs;
    use crate::safety::endstops::NullEndstops;
    use pulse_common::axis::Motor;
    use pulse_common::block::BlockSpec;

    fn engine() -> (Stepper, TickContext, PortLogs, Arc<ManualTickSource>) {
        let source = Arc::new(ManualTickSource::new());
        let (ports, logs) = PortTable::recording();
        let (stepper, tick) =
            init(&StepperConfig::default(), ports, Box::new(NullEndstops), source.clone()).unwrap();
        (stepper, tick, logs, source)
    }

    fn constant(steps: [u32; 4]) -> Block {
        Block::try_from(BlockSpec::constant_rate(steps, 1000)).unwrap()
    }

    #[test]
    fn loaded_block_steps_on_the_same_tick() {
        let (stepper, mut tick, logs, _source) = engine();
        stepper.push_block(constant([3, 0, 0, 0])).unwrap();

        let first = tick.tick();
        assert_eq!(first.step_events, 1);
        assert_eq!(first.pulses, [1, 0, 0, 0]);
        assert_eq!(first.interval, 2000);
        assert!(!first.idle);
        assert_eq!(logs.get(Motor::X).steps(), 1);
    }

    #[test]
    fn finished_block_sleeps_the_source() {
        let (stepper, mut tick, _logs, source) = engine();
        stepper.push_block(constant([2, 0, 0, 0])).unwrap();
        tick.tick();
        let last = tick.tick();
        assert!(last.block_finished);
        assert!(last.idle);
        assert_eq!(last.interval, IDLE_INTERVAL);
        assert!(!source.is_armed());
        assert!(stepper.is_idle());
        assert_eq!(stepper.position(Axis::X), 2);
    }

    const IDLE_INTERVAL: u32 = pulse_common::consts::IDLE_INTERVAL_TICKS;

    #[test]
    fn next_block_loads_at_the_boundary() {
        let (stepper, mut tick, logs, _source) = engine();
        stepper.push_block(constant([2, 0, 0, 0])).unwrap();
        stepper
            .push_block(Block::try_from(BlockSpec::constant_rate([0, 2, 0, 0], 1000).reversed(Axis::Y)).unwrap())
            .unwrap();

        tick.tick();
        let boundary = tick.tick();
        assert!(boundary.block_finished);
        assert!(!boundary.idle);
        assert_eq!(boundary.interval, 2000);
        assert_eq!(tick.current_block().map(|b| b.dominant_axis()), Some(Axis::Y));
        // direction is already set for the next block
        assert!(!logs.get(Motor::Y).dir_high());

        let next = tick.tick();
        assert_eq!(next.pulses, [0, 1, 0, 0]);
        assert_eq!(logs.get(Motor::Y).net_steps(), -1);
    }

    #[test]
    fn quick_stop_takes_effect_on_the_next_tick() {
        let (stepper, mut tick, logs, _source) = engine();
        stepper.push_block(constant([100, 0, 0, 0])).unwrap();
        stepper.push_block(constant([100, 0, 0, 0])).unwrap();
        tick.tick();

        stepper.quick_stop();
        let out = tick.tick();
        assert_eq!(out.discarded, 2);
        assert_eq!(out.step_events, 0);
        assert!(out.idle);
        assert!(stepper.is_idle());
        assert_eq!(logs.get(Motor::X).steps(), 1);

        for _ in 0..10 {
            assert_eq!(tick.tick().step_events, 0);
        }
        assert_eq!(logs.get(Motor::X).steps(), 1);
        assert_eq!(stepper.check_stepper_errors().quick_stops, 1);
    }

    #[test]
    fn block_kept_by_a_stop_programs_its_own_interval() {
        // a block enqueued after the cutoff was taken, as when a producer
        // races an endstop abort
        let (stepper, mut tick, _logs, _source) = engine();
        stepper.push_block(constant([100, 0, 0, 0])).unwrap();
        stepper.push_block(constant([0, 5, 0, 0])).unwrap();
        tick.tick();

        let mut out = Tick::default();
        tick.quick_stop(1, &mut out);
        assert_eq!(out.discarded, 1);
        assert_eq!(out.interval, 2000);
        assert_eq!(tick.current_block().map(|b| b.dominant_axis()), Some(Axis::Y));

        let next = tick.tick();
        assert_eq!(next.pulses, [0, 1, 0, 0]);
        assert!(next.interval >= pulse_common::consts::MIN_INTERVAL_TICKS);
    }

    #[test]
    fn babystep_skips_a_locked_dual_motor() {
        let mut config = StepperConfig::default();
        config.endstops.dual_axis = Some(Axis::Z);
        let source = Arc::new(ManualTickSource::new());
        let (ports, logs) = PortTable::recording();
        let (stepper, mut tick) =
            init(&config, ports, Box::new(NullEndstops), source).unwrap();
        stepper.lock_axis_motor(pulse_common::axis::DualMotor::Secondary, true);

        stepper.babystep(Axis::Z, true).unwrap();
        let out = tick.tick();
        assert!(out.babysteps.has(Axis::Z));
        assert_eq!(logs.get(Motor::Z).steps(), 1);
        assert_eq!(logs.get(Motor::Z2).steps(), 0);

        stepper.push_block(constant([0, 0, 3, 0])).unwrap();
        stepper.synchronize_with(|| {
            tick.tick();
        });
        assert_eq!(logs.get(Motor::Z).steps(), 4);
        assert_eq!(logs.get(Motor::Z2).steps(), 0);
    }

    #[test]
    fn block_pushed_after_quick_stop_survives() {
        let (stepper, mut tick, _logs, _source) = engine();
        stepper.push_block(constant([100, 0, 0, 0])).unwrap();
        tick.tick();
        stepper.quick_stop();
        stepper.push_block(constant([0, 4, 0, 0])).unwrap();

        let out = tick.tick();
        assert_eq!(out.discarded, 1);
        assert_eq!(out.pulses, [0, 1, 0, 0]);
        stepper.synchronize_with(|| {
            tick.tick();
        });
        assert_eq!(stepper.positions(), [1, 4, 0, 0]);
    }

    #[test]
    fn babystep_restores_block_direction() {
        let (stepper, mut tick, logs, _source) = engine();
        let block = Block::try_from(BlockSpec::constant_rate([0, 0, 5, 0], 1000).reversed(Axis::Z)).unwrap();
        stepper.push_block(block).unwrap();
        tick.tick();

        stepper.babystep(Axis::Z, true).unwrap();
        let out = tick.tick();
        assert_eq!(out.babysteps, AxisMask::Z);
        let z = logs.get(Motor::Z);
        assert_eq!(z.steps(), 3);
        assert_eq!(z.net_steps(), -1);
        assert!(!z.dir_high());
        // babysteps do not move the tracked position
        assert_eq!(stepper.position(Axis::Z), -2);
    }

    #[test]
    fn babystep_wakes_an_idle_engine() {
        let (stepper, mut tick, logs, source) = engine();
        tick.tick();
        assert!(!source.is_armed());

        stepper.babystep(Axis::X, false).unwrap();
        assert!(source.is_armed());
        let out = tick.tick();
        assert_eq!(out.babysteps, AxisMask::X);
        assert!(out.idle);
        assert_eq!(logs.get(Motor::X).net_steps(), -1);
        assert!(!source.is_armed());
    }

    #[test]
    fn fast_blocks_run_several_events_per_tick() {
        let (stepper, mut tick, _logs, _source) = engine();
        let fast = Block::try_from(BlockSpec::constant_rate([400, 0, 0, 0], 30_000)).unwrap();
        stepper.push_block(fast).unwrap();
        tick.tick();
        let out = tick.tick();
        assert_eq!(out.step_events, 4);
        // 30 000 steps/s in groups of four
        assert_eq!(out.interval, 2_000_000 / 7_500);
    }
}
