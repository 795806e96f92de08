use chrono::NaiveDate;
use clap::Parser;

use crate::{
    api::elexon,
    cli::StoreArgs,
    core::fetcher::{FetchOutcome, Fetcher},
    prelude::*,
};

#[derive(Parser)]
pub struct ElexonArgs {
    #[clap(long = "base-url", env = "ELEXON_URL", default_value = elexon::DEFAULT_URL)]
    pub url: String,

    /// Timeout of a single period request.
    #[clap(long, env = "ELEXON_TIMEOUT", default_value = "10s")]
    pub timeout: humantime::Duration,

    #[clap(long, env = "ELEXON_USER_AGENT", default_value = elexon::DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl ElexonArgs {
    pub fn api(&self) -> elexon::Api {
        elexon::Api::new(&self.url, self.timeout.into(), &self.user_agent)
    }
}

#[derive(Parser)]
pub struct DownloadArgs {
    /// Settlement date, for example `2024-01-24`.
    #[clap(long, env = "SETTLEMENT_DATE")]
    pub date: NaiveDate,

    /// Pause between consecutive period requests.
    #[clap(long, env = "ELEXON_DELAY", default_value = "200ms")]
    pub delay: humantime::Duration,

    #[clap(flatten)]
    pub elexon: ElexonArgs,
}

impl DownloadArgs {
    /// Fetch the day and save it, leaving the store untouched when nothing came back.
    ///
    /// Total failure is an error, an empty day is not. Returns whether the store was written.
    pub fn run(&self, store: &StoreArgs) -> Result<bool> {
        let report = Fetcher::new(self.elexon.api(), self.delay.into()).fetch_day(self.date);
        match &report.outcome {
            FetchOutcome::Complete => {
                info!(n_records = report.table.len(), columns = ?report.table.header(), "complete");
            }
            FetchOutcome::Partial { failed_periods } => {
                warn!(n_records = report.table.len(), ?failed_periods, "some periods are missing");
            }
            FetchOutcome::NoData => {
                warn!(date = %self.date, "the upstream has no acceptances for the day");
            }
            FetchOutcome::TotalFailure { failed_periods } => {
                bail!(
                    "total failure: no data for {}, {} periods failed",
                    self.date,
                    failed_periods.len(),
                );
            }
        }
        let persisted = report.persist(&store.acceptances_path)?;
        if persisted {
            info!(path = %store.acceptances_path.display(), "saved");
        }
        Ok(persisted)
    }
}

#[derive(Parser)]
pub struct FetchArgs {
    #[clap(flatten)]
    pub download: DownloadArgs,

    #[clap(flatten)]
    pub store: StoreArgs,
}

impl FetchArgs {
    pub fn run(&self) -> Result {
        self.download.run(&self.store)?;
        Ok(())
    }
}
