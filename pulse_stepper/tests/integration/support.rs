//! Shared harness: an engine with recording ports and switchable endstops.

use pulse_common::prelude::*;
use pulse_stepper::{
    EndstopInputs, ManualTickSource, PortLogs, PortTable, Stepper, Tick, TickContext, init,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

/// Switch levels the test flips while the engine runs.
#[derive(Debug, Clone, Default)]
pub struct Switches(Arc<AtomicU16>);

impl Switches {
    pub fn set(&self, endstop: Endstop, high: bool) {
        if high {
            self.0.fetch_or(endstop.mask(), Ordering::AcqRel);
        } else {
            self.0.fetch_and(!endstop.mask(), Ordering::AcqRel);
        }
    }
}

impl EndstopInputs for Switches {
    fn read(&mut self, endstop: Endstop) -> bool {
        self.0.load(Ordering::Acquire) & endstop.mask() != 0
    }
}

pub struct Harness {
    pub stepper: Stepper,
    pub tick: TickContext,
    pub logs: PortLogs,
    pub switches: Switches,
    pub source: Arc<ManualTickSource>,
}

impl Harness {
    pub fn new(config: &StepperConfig) -> Self {
        let source = Arc::new(ManualTickSource::new());
        let switches = Switches::default();
        let (ports, logs) = PortTable::recording();
        let (stepper, tick) =
            init(config, ports, Box::new(switches.clone()), source.clone()).unwrap();
        Self {
            stepper,
            tick,
            logs,
            switches,
            source,
        }
    }

    pub fn default_machine() -> Self {
        Self::new(&StepperConfig::default())
    }

    /// Tick until the engine reports idle, collecting every tick.
    pub fn run_until_idle(&mut self) -> Vec<Tick> {
        let mut ticks = Vec::new();
        for _ in 0..1_000_000 {
            let tick = self.tick.tick();
            ticks.push(tick);
            if tick.idle && self.stepper.is_idle() {
                return ticks;
            }
        }
        panic!("engine did not go idle");
    }

    pub fn run(&mut self, count: usize) -> Vec<Tick> {
        (0..count).map(|_| self.tick.tick()).collect()
    }

    pub fn steps(&self, motor: Motor) -> u32 {
        self.logs.get(motor).steps()
    }
}

/// Config with the given switches installed.
pub fn with_switches(switches: &[Endstop]) -> StepperConfig {
    let mut config = StepperConfig::default();
    for &id in switches {
        config
            .endstops
            .switches
            .push(SwitchConfig { id, inverting: false })
            .unwrap();
    }
    config
}

pub fn constant(steps: AxisArray<u32>, rate: u32) -> Block {
    Block::try_from(BlockSpec::constant_rate(steps, rate)).unwrap()
}

/// The reference trapezoid: 1000 dominant steps, 200/600/200.
pub fn trapezoid(steps: AxisArray<u32>) -> Block {
    Block::try_from(BlockSpec {
        steps,
        nominal_rate: 1000,
        entry_rate: 100,
        exit_rate: 100,
        accel_steps: 200,
        decel_steps: 200,
        acceleration: 2475,
        ..Default::default()
    })
    .unwrap()
}
