//! Safety Monitor: limit switch sampling, hit records, quick-stop.

pub mod endstops;
pub mod hits;
pub mod stop;
