//! Axis and motor identifiers.
//!
//! A logical [`Axis`] is what a block moves; a physical [`Motor`] is what a
//! step/dir port drives. Dual-carriage X, dual-motor Z and the extruder table
//! make the mapping one-to-many.

use crate::consts::{MAX_EXTRUDERS, NUM_AXIS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One value per logical axis, indexed by [`Axis::index`].
pub type AxisArray<T> = [T; NUM_AXIS];

/// Logical motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
    /// Active extruder.
    E = 3,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; NUM_AXIS] = [Axis::X, Axis::Y, Axis::Z, Axis::E];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::X),
            1 => Some(Self::Y),
            2 => Some(Self::Z),
            3 => Some(Self::E),
            _ => None,
        }
    }

    /// Upper-case axis letter used in reports.
    pub const fn letter(self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::E => 'E',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Physical motor driven by one step/dir port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Motor {
    X,
    /// Second X carriage.
    X2,
    Y,
    Z,
    /// Second Z motor.
    Z2,
    /// Extruder by index, `0..MAX_EXTRUDERS`.
    E(u8),
}

impl Motor {
    /// Position in the port table.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::X2 => 1,
            Self::Y => 2,
            Self::Z => 3,
            Self::Z2 => 4,
            Self::E(n) => 5 + n as usize,
        }
    }

    /// Inverse of [`Motor::index`].
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::X),
            1 => Some(Self::X2),
            2 => Some(Self::Y),
            3 => Some(Self::Z),
            4 => Some(Self::Z2),
            n if n >= 5 && n < 5 + MAX_EXTRUDERS => Some(Self::E((n - 5) as u8)),
            _ => None,
        }
    }

    /// Logical axis this motor moves.
    pub const fn axis(self) -> Axis {
        match self {
            Self::X | Self::X2 => Axis::X,
            Self::Y => Axis::Y,
            Self::Z | Self::Z2 => Axis::Z,
            Self::E(_) => Axis::E,
        }
    }

    /// Motor of the given extruder index, if in range.
    pub const fn extruder(index: usize) -> Option<Self> {
        if index < MAX_EXTRUDERS {
            Some(Self::E(index as u8))
        } else {
            None
        }
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::X2 => f.write_str("X2"),
            Self::Y => f.write_str("Y"),
            Self::Z => f.write_str("Z"),
            Self::Z2 => f.write_str("Z2"),
            Self::E(n) => write!(f, "E{n}"),
        }
    }
}

/// Unknown motor name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown motor '{0}' (expected x, x2, y, z, z2 or e0..e{max})", max = MAX_EXTRUDERS - 1)]
pub struct ParseMotorError(pub String);

impl FromStr for Motor {
    type Err = ParseMotorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "x" => Ok(Self::X),
            "x2" => Ok(Self::X2),
            "y" => Ok(Self::Y),
            "z" => Ok(Self::Z),
            "z2" => Ok(Self::Z2),
            other => other
                .strip_prefix('e')
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(Self::extruder)
                .ok_or_else(|| ParseMotorError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Motor {
    type Error = ParseMotorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Motor> for String {
    fn from(motor: Motor) -> Self {
        motor.to_string().to_ascii_lowercase()
    }
}

/// One of the two motors of a dual-endstop axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DualMotor {
    #[default]
    Primary = 0,
    Secondary = 1,
}

impl DualMotor {
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_index_round_trip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_u8(axis as u8), Some(axis));
        }
        assert_eq!(Axis::from_u8(4), None);
    }

    #[test]
    fn motor_index_is_dense() {
        for index in 0..crate::consts::MOTOR_SLOTS {
            let motor = Motor::from_index(index).unwrap();
            assert_eq!(motor.index(), index);
        }
        assert_eq!(Motor::from_index(crate::consts::MOTOR_SLOTS), None);
    }

    #[test]
    fn motor_parses_names() {
        assert_eq!("x2".parse::<Motor>().unwrap(), Motor::X2);
        assert_eq!("Z2".parse::<Motor>().unwrap(), Motor::Z2);
        assert_eq!("e3".parse::<Motor>().unwrap(), Motor::E(3));
        assert!("e4".parse::<Motor>().is_err());
        assert!("w".parse::<Motor>().is_err());
    }

    #[test]
    fn motor_maps_to_axis() {
        assert_eq!(Motor::X2.axis(), Axis::X);
        assert_eq!(Motor::Z2.axis(), Axis::Z);
        assert_eq!(Motor::E(1).axis(), Axis::E);
    }

    #[test]
    fn motor_serde_uses_lowercase_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            motor: Motor,
        }
        let text = toml::to_string(&Wrapper { motor: Motor::E(2) }).unwrap();
        assert!(text.contains("\"e2\""));
        let back: Wrapper = toml::from_str("motor = \"z2\"").unwrap();
        assert_eq!(back.motor, Motor::Z2);
    }
}
