//! Fault bitflags for the stepper diagnostics interface.
//!
//! The tick context never returns errors; it raises these flags and bumps
//! counters, and the producer side summarizes them on request.

use bitflags::bitflags;

bitflags! {
    /// Fault classes accumulated since the last counter reset.
    ///
    /// SAFETY flags (→ motion was aborted): ENDSTOP_ABORT.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u16 {
        /// Tick finished later than its deadline.
        const OVERRUN         = 0x0001;
        /// Queue ran dry while the last block still had exit speed.
        const UNDERRUN        = 0x0002;
        /// Requested step rate exceeded what the timer can schedule.
        const RATE_CLAMP      = 0x0004;
        /// A block was refused at admission.
        const REJECTED_BLOCK  = 0x0008;
        /// Unexpected endstop hit aborted motion. **SAFETY**.
        const ENDSTOP_ABORT   = 0x0010;
        /// Quick-stop requested by the firmware.
        const QUICK_STOP      = 0x0020;
    }
}

impl FaultFlags {
    /// Flags meaning motion was cut short.
    pub const SAFETY_MASK: Self = Self::from_bits_truncate(Self::ENDSTOP_ABORT.bits());

    /// Flags that point at a timing budget problem.
    pub const TIMING_MASK: Self = Self::from_bits_truncate(
        Self::OVERRUN.bits() | Self::UNDERRUN.bits() | Self::RATE_CLAMP.bits(),
    );

    #[inline]
    pub const fn has_safety(&self) -> bool {
        self.intersects(Self::SAFETY_MASK)
    }

    #[inline]
    pub const fn has_timing(&self) -> bool {
        self.intersects(Self::TIMING_MASK)
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}
