mod estimate;
mod fetch;
mod inspect;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{core::estimator::Estimate, prelude::*};

pub use self::{
    estimate::EstimateArgs,
    fetch::{DownloadArgs, FetchArgs},
    inspect::InspectArgs,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download all bid-offer acceptances of one settlement day into the local store.
    #[clap(name = "fetch")]
    Fetch(Box<FetchArgs>),

    /// Estimate the curtailed volume and its cost from the local store.
    #[clap(name = "estimate")]
    Estimate(Box<EstimateArgs>),

    /// Fetch, then estimate.
    #[clap(name = "run")]
    Run(Box<RunArgs>),

    /// Print the field names the upstream currently returns.
    #[clap(name = "inspect")]
    Inspect(Box<InspectArgs>),
}

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    pub download: DownloadArgs,

    #[clap(flatten)]
    pub estimate: EstimateArgs,
}

impl RunArgs {
    /// Estimate the freshly fetched day, never a table left over from an earlier run.
    pub fn run(&self) -> Result<Estimate> {
        if !self.download.run(&self.estimate.store)? {
            bail!("no data for {}, nothing to estimate", self.download.date);
        }
        self.estimate.run()
    }
}

#[derive(Parser)]
pub struct StoreArgs {
    /// Flat acceptance table, overwritten by `fetch` and read by `estimate`.
    #[clap(
        long = "acceptances",
        env = "ACCEPTANCES_PATH",
        default_value = "data/raw/raw_acceptances.csv"
    )]
    pub acceptances_path: PathBuf,
}
