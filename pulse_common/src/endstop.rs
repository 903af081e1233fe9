//! Limit switch identifiers.
//!
//! A switch is addressed by axis, side and (for dual-endstop axes) motor.
//! The dense [`Endstop::index`] lets the engine keep per-switch state in
//! fixed arrays and bitmasks.

use crate::axis::{Axis, DualMotor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which end of travel a switch guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EndstopSide {
    /// Reached while moving in the negative direction.
    Min = 0,
    /// Reached while moving in the positive direction.
    Max = 1,
}

impl EndstopSide {
    /// Side approached by motion in the given direction.
    #[inline]
    pub const fn toward(negative: bool) -> Self {
        if negative { Self::Min } else { Self::Max }
    }
}

/// A physical limit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endstop {
    pub axis: Axis,
    pub side: EndstopSide,
    pub motor: DualMotor,
}

impl Endstop {
    /// Number of addressable switches (axis × motor × side).
    pub const COUNT: usize = 16;

    pub const fn new(axis: Axis, side: EndstopSide) -> Self {
        Self {
            axis,
            side,
            motor: DualMotor::Primary,
        }
    }

    /// Switch of the secondary motor of a dual-endstop axis.
    pub const fn secondary(axis: Axis, side: EndstopSide) -> Self {
        Self {
            axis,
            side,
            motor: DualMotor::Secondary,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.axis.index() * 4 + self.motor.index() * 2 + self.side as usize
    }

    /// Inverse of [`Endstop::index`].
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= Self::COUNT {
            return None;
        }
        let axis = match Axis::from_u8((index / 4) as u8) {
            Some(axis) => axis,
            None => return None,
        };
        let motor = if (index / 2) % 2 == 0 {
            DualMotor::Primary
        } else {
            DualMotor::Secondary
        };
        let side = if index % 2 == 0 {
            EndstopSide::Min
        } else {
            EndstopSide::Max
        };
        Some(Self { axis, side, motor })
    }

    /// Bit of this switch in a `u16` switch mask.
    #[inline]
    pub const fn mask(self) -> u16 {
        1 << self.index()
    }
}

impl fmt::Display for Endstop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.motor {
            DualMotor::Primary => "",
            DualMotor::Secondary => "2",
        };
        let side = match self.side {
            EndstopSide::Min => "MIN",
            EndstopSide::Max => "MAX",
        };
        write!(f, "{}{}_{}", self.axis, suffix, side)
    }
}

/// Unknown switch name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown endstop '{0}' (expected e.g. x_min, z2_max)")]
pub struct ParseEndstopError(pub String);

impl FromStr for Endstop {
    type Err = ParseEndstopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseEndstopError(s.to_string());
        let lower = s.trim().to_ascii_lowercase();
        let (name, side) = lower.split_once('_').ok_or_else(err)?;
        let side = match side {
            "min" => EndstopSide::Min,
            "max" => EndstopSide::Max,
            _ => return Err(err()),
        };
        let (axis, motor) = match name {
            "x" => (Axis::X, DualMotor::Primary),
            "y" => (Axis::Y, DualMotor::Primary),
            "z" => (Axis::Z, DualMotor::Primary),
            "x2" => (Axis::X, DualMotor::Secondary),
            "y2" => (Axis::Y, DualMotor::Secondary),
            "z2" => (Axis::Z, DualMotor::Secondary),
            _ => return Err(err()),
        };
        Ok(Self { axis, side, motor })
    }
}

impl TryFrom<String> for Endstop {
    type Error = ParseEndstopError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endstop> for String {
    fn from(endstop: Endstop) -> Self {
        endstop.to_string().to_ascii_lowercase()
    }
}
