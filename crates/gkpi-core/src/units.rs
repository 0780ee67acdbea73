//! Compile-time unit safety for grid quantities.
//!
//! Prevents mixing incompatible units like MW and Mvar, or energy and power.
//!
//! # Design Philosophy
//!
//! Episode replay and KPI reduction juggle several physical quantities:
//! - Active power (MW) and reactive power (Mvar) setpoints
//! - Voltage targets (kV)
//! - Branch currents (A) compared against thermal limits (A)
//! - Energy (MWh) accumulated over irregular step durations (h)
//!
//! All types use `#[repr(transparent)]` so they share the layout of `f64`.
//!
//! # Usage
//!
//! ```
//! use gkpi_core::units::{Hours, Megawatts, MegawattHours};
//!
//! let p = Megawatts(10.0);
//! let e: MegawattHours = p * Hours(0.25);
//! assert_eq!(e.value(), 2.5);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Absolute value
            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Maximum of two values
            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Power Units
// =============================================================================

/// Active power in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Reactive power in megavolt-amperes reactive (Mvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megavars(pub f64);

impl_unit_ops!(Megavars, "Mvar");

// =============================================================================
// Voltage and Current Units
// =============================================================================

/// Voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

/// Current in amperes (A)
///
/// Thermal limits recorded in episodes are expressed in amperes, so branch
/// currents returned by power-flow engines use the same unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

impl Megawatts {
    /// Three-phase line current carried by an active power flow at a given line voltage.
    ///
    /// `I = |P| / (√3 · V)`; a non-positive voltage yields zero current.
    #[inline]
    pub fn line_current(self, voltage: Kilovolts) -> Amperes {
        if voltage.0 <= 0.0 {
            return Amperes(0.0);
        }
        Amperes(self.0.abs() * 1000.0 / (3.0_f64.sqrt() * voltage.0))
    }
}

// =============================================================================
// Time and Energy Units
// =============================================================================

/// Duration in hours (h)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Hours(pub f64);

impl_unit_ops!(Hours, "h");

impl Hours {
    /// Convert a duration in seconds to hours.
    #[inline]
    pub fn from_seconds(seconds: f64) -> Self {
        Hours(seconds / 3600.0)
    }
}

/// Energy in megawatt-hours (MWh)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegawattHours(pub f64);

impl_unit_ops!(MegawattHours, "MWh");

impl Mul<Hours> for Megawatts {
    type Output = MegawattHours;
    fn mul(self, rhs: Hours) -> Self::Output {
        MegawattHours(self.0 * rhs.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
