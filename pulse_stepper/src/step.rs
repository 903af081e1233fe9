//! Step Generator and Timing Engine.
//!
//! - [`bresenham`] decides which axes pulse on each step event.
//! - [`profile`] walks the trapezoid: accelerate, cruise, decelerate.
//! - [`timer`] turns a step rate into a timer interval without dividing.

pub mod bresenham;
pub mod profile;
pub mod timer;
