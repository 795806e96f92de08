use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Price per megawatt-hour.
pub type MegawattHourRate = Quantity<f64, -1, -1, 1>;

impl MegawattHourRate {
    /// Typical curtailment bid used by the published estimates.
    pub const DEFAULT: Self = Self(70.0);
}

impl Display for MegawattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/MWh", self.0)
    }
}

impl Debug for MegawattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/MWh", self.0)
    }
}
