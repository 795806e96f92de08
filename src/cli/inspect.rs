use chrono::NaiveDate;
use clap::Parser;

use crate::{cli::fetch::ElexonArgs, core::fetcher::AcceptanceSource, prelude::*};

#[derive(Parser)]
pub struct InspectArgs {
    #[clap(long, env = "SETTLEMENT_DATE")]
    pub date: NaiveDate,

    #[clap(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=48))]
    pub period: u8,

    #[clap(flatten)]
    pub elexon: ElexonArgs,
}

impl InspectArgs {
    /// Fetch one settlement period and print the field names of its first record.
    pub fn run(&self) -> Result {
        let records = self.elexon.api().get_period(self.date, self.period)?;
        let Some(first) = records.first() else {
            warn!(date = %self.date, period = self.period, "no records returned");
            return Ok(());
        };
        info!(n_records = records.len(), "fetched");
        for key in first.keys() {
            println!("{key}");
        }
        Ok(())
    }
}
