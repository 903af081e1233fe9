//! System-wide constants for the pulse workspace.
//!
//! Single source of truth for capacities, timer defaults and parameter bounds.

use static_assertions::const_assert;

/// Number of logical axes (X, Y, Z, E).
pub const NUM_AXIS: usize = 4;

/// Maximum number of extruder step/dir handles.
pub const MAX_EXTRUDERS: usize = 4;

/// Physical motor slots: X, X2, Y, Z, Z2, E0..E3.
pub const MOTOR_SLOTS: usize = 5 + MAX_EXTRUDERS;

/// Capacity of the block queue. Must be a power of two.
pub const BLOCK_BUFFER_SIZE: usize = 16;

/// Default step timer frequency (16 MHz / 8 prescaler).
pub const TIMER_FREQUENCY_HZ: u32 = 2_000_000;
pub const TIMER_FREQUENCY_HZ_MIN: u32 = 100_000;
pub const TIMER_FREQUENCY_HZ_MAX: u32 = 100_000_000;

/// Highest step rate the tick context can sustain with multi-stepping.
pub const MAX_STEP_FREQUENCY: u32 = 40_000;
pub const MAX_STEP_FREQUENCY_MIN: u32 = 1_000;
pub const MAX_STEP_FREQUENCY_MAX: u32 = 400_000;

/// Shortest programmable tick interval [timer ticks].
pub const MIN_INTERVAL_TICKS: u32 = 100;
pub const MIN_INTERVAL_TICKS_MAX: u32 = 10_000;

/// Longest programmable tick interval [timer ticks] (16-bit compare register).
pub const MAX_INTERVAL_TICKS: u32 = u16::MAX as u32;

/// Interval used while idle-polling with no block [timer ticks] (1 kHz at 2 MHz).
pub const IDLE_INTERVAL_TICKS: u32 = 2_000;

/// Steps per millimetre bounds.
pub const STEPS_PER_MM_MIN: f64 = 0.001;
pub const STEPS_PER_MM_MAX: f64 = 1_000_000.0;

/// Motor current bounds [mA].
pub const MOTOR_CURRENT_MAX_MA: u32 = 5_000;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pulse/machine.toml";

const_assert!(BLOCK_BUFFER_SIZE.is_power_of_two());
const_assert!(BLOCK_BUFFER_SIZE <= 128);
const_assert!(MIN_INTERVAL_TICKS < MAX_INTERVAL_TICKS);
const_assert!(IDLE_INTERVAL_TICKS <= MAX_INTERVAL_TICKS);
