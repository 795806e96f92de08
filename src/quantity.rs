pub mod cost;
pub mod energy;
pub mod power;
pub mod rate;
pub mod time;

use std::ops::{Div, Mul};

use serde::{Deserialize, Serialize};

/// Dimension-tagged scalar.
///
/// The exponents track megawatts, hours and currency units, so that only physically meaningful
/// products type-check: `MW × h → MWh`, `MWh × cost/MWh → cost`.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    PartialEq,
    PartialOrd,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
#[serde(transparent)]
pub struct Quantity<T, const POWER: isize, const TIME: isize, const COST: isize>(pub T);

impl<const POWER: isize, const TIME: isize, const COST: isize> Quantity<f64, POWER, TIME, COST> {
    pub const ZERO: Self = Self(0.0);

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    #[must_use]
    pub const fn is_sign_negative(self) -> bool {
        self.0 < 0.0
    }
}

impl<T, const POWER: isize, const TIME: isize, const COST: isize> Mul<T>
    for Quantity<T, POWER, TIME, COST>
where
    T: Mul<T>,
{
    type Output = Quantity<T::Output, POWER, TIME, COST>;

    fn mul(self, rhs: T) -> Self::Output {
        Quantity(self.0 * rhs)
    }
}

impl<T, const POWER: isize, const TIME: isize, const COST: isize> Div<T>
    for Quantity<T, POWER, TIME, COST>
where
    T: Div<T>,
{
    type Output = Quantity<T::Output, POWER, TIME, COST>;

    fn div(self, rhs: T) -> Self::Output {
        Quantity(self.0 / rhs)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::{Debug, Formatter};

    use super::*;

    type Bare = Quantity<f64, 0, 0, 0>;

    impl Debug for Bare {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    #[test]
    fn test_abs() {
        assert_eq!(Bare::from(-1.5).abs(), Bare::from(1.5));
        assert_eq!(Bare::from(2.0).abs(), Bare::from(2.0));
    }

    #[test]
    fn test_sum() {
        let sum: Bare = [1.0, 2.0, -0.5].into_iter().map(Bare::from).sum();
        assert_eq!(sum, Bare::from(2.5));
    }

    #[test]
    fn test_scalar_ops() {
        assert_eq!(Bare::from(3.0) * 2.0, Bare::from(6.0));
        assert_eq!(Bare::from(3.0) / 2.0, Bare::from(1.5));
    }
}
