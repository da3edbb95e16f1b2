use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Fixed-point APX scalar: stores hundredths of an APX as a signed integer so
/// debt-ceiling balances can go negative without any floating point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from a whole-and-fractional APX value, e.g. `Money::from_apx(100, 0)`.
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Money(hundredths)
    }

    pub fn from_apx(apx: i64) -> Self {
        Money(apx.saturating_mul(100))
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Money) -> Result<Money, TypesError> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or(TypesError::Overflow)
    }

    pub fn checked_sub(self, rhs: Money) -> Result<Money, TypesError> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .ok_or(TypesError::Overflow)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        write!(f, "{whole}.{frac:02}")
    }
}
