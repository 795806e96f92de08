use std::{
    fmt::{Debug, Display, Formatter},
    ops::Mul,
};

use crate::quantity::{Quantity, cost::Cost, rate::MegawattHourRate};

pub type MegawattHours = Quantity<f64, 1, 1, 0>;

impl Display for MegawattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} MWh", self.0)
    }
}

impl Debug for MegawattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}MWh", self.0)
    }
}

impl Mul<MegawattHourRate> for MegawattHours {
    type Output = Cost;

    fn mul(self, rhs: MegawattHourRate) -> Self::Output {
        Cost::from(self.0 * rhs.0)
    }
}
