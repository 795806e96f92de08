use std::{fs, path::PathBuf};

use clap::Parser;

use crate::{
    cli::StoreArgs,
    core::{
        classifier::{AssetFilter, ClassifierColumns, UnitSet},
        estimator::{Estimate, Estimator, InterventionPolicy},
    },
    locations::Locations,
    prelude::*,
    quantity::rate::MegawattHourRate,
    reference::ReferenceTable,
    store::{AcceptanceTable, StoreError},
    tables::{build_assets_table, build_summary_table},
};

#[derive(Copy, Clone, Debug, Default, clap::ValueEnum)]
pub enum OnMissingReference {
    /// Stop with an error.
    #[default]
    Abort,

    /// Estimate over all acceptances, regardless of the fuel type.
    Unfiltered,
}

#[derive(Copy, Clone, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser)]
pub struct ReferenceArgs {
    /// BM unit register with the fuel type of every unit, XLSX or CSV.
    #[clap(
        long = "fuel-types",
        env = "FUEL_TYPES_PATH",
        default_value = "data/static/BMUFuelType.xlsx"
    )]
    pub fuel_types_path: PathBuf,

    /// Fuel category to estimate for.
    #[clap(long, env = "FUEL_TYPE", default_value = "WIND")]
    pub fuel_type: String,

    #[clap(long, env = "FUEL_TYPE_COLUMN", default_value = "BMRS FUEL TYPE")]
    pub fuel_type_column: String,

    #[clap(long, env = "REGISTRY_ID_COLUMN", default_value = "NESO BMU ID")]
    pub registry_id_column: String,

    #[clap(long, env = "SETTLEMENT_ID_COLUMN", default_value = "SETT UNIT ID")]
    pub settlement_id_column: String,

    /// What to do when the register cannot be loaded or lacks a column.
    #[clap(long, env = "ON_MISSING_REFERENCE", default_value = "abort")]
    pub on_missing_reference: OnMissingReference,
}

impl ReferenceArgs {
    fn columns(&self) -> ClassifierColumns {
        ClassifierColumns::builder()
            .fuel_type(&self.fuel_type_column)
            .registry_id(&self.registry_id_column)
            .settlement_id(&self.settlement_id_column)
            .build()
    }

    pub fn asset_filter(&self) -> Result<AssetFilter> {
        let units = ReferenceTable::read_from(&self.fuel_types_path)
            .and_then(|table| UnitSet::classify(&table, &self.columns(), &self.fuel_type));
        match (units, self.on_missing_reference) {
            (Ok(units), _) => Ok(AssetFilter::from_units(units)),
            (Err(error), OnMissingReference::Unfiltered) => {
                warn!("{error}, proceeding with all acceptances");
                Ok(AssetFilter::Unfiltered)
            }
            (Err(error), OnMissingReference::Abort) => {
                Err(Error::new(error).context("failed to classify the BM units"))
            }
        }
    }
}

#[derive(Parser)]
pub struct EstimateArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    #[clap(flatten)]
    pub reference: ReferenceArgs,

    /// Assumed constraint payment per megawatt-hour.
    #[clap(long = "price-per-mwh", env = "PRICE_PER_MWH", default_value = "70")]
    pub price: MegawattHourRate,

    #[clap(long, env = "INTERVENTION", default_value = "all-wind")]
    pub intervention: InterventionPolicy,

    #[clap(long = "locations", env = "LOCATIONS_PATH", default_value = "locations.toml")]
    pub locations_path: PathBuf,

    /// Number of assets to list.
    #[clap(long, env = "TOP", default_value = "10")]
    pub top: usize,

    /// Save the per-asset totals as CSV.
    #[clap(long, env = "ASSETS_OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Save the assets with known coordinates as JSON for the map.
    #[clap(long, env = "MAP_OUTPUT_PATH")]
    pub map_output: Option<PathBuf>,

    #[clap(long, env = "OUTPUT_FORMAT", default_value = "table")]
    pub format: OutputFormat,

    #[clap(long, env = "CURRENCY", default_value = "£")]
    pub currency: String,
}

impl EstimateArgs {
    fn load_acceptances(&self) -> Result<AcceptanceTable> {
        let path = &self.store.acceptances_path;
        let table = match AcceptanceTable::read_from(path) {
            Ok(table) => table,
            Err(error @ StoreError::NotFound { .. }) => {
                return Err(Error::new(error).context("no acceptance data, run `fetch` first"));
            }
            Err(error) => {
                return Err(Error::new(error).context("failed to load the acceptances"));
            }
        };
        if table.is_empty() {
            warn!(path = %path.display(), "the acceptance table has no rows");
        }
        Ok(table)
    }

    pub fn run(&self) -> Result<Estimate> {
        let table = self.load_acceptances()?;
        let filter = self.reference.asset_filter()?;
        let estimate = Estimator::builder()
            .price(self.price)
            .policy(self.intervention)
            .build()
            .estimate(&table, &filter)?;
        let locations = Locations::read_from(&self.locations_path)?;

        if let Some(path) = &self.output {
            estimate.write_assets_to(path)?;
        }
        if let Some(path) = &self.map_output {
            let mapped = locations.map(&estimate);
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&mapped)?)
                .with_context(|| format!("failed to write `{}`", path.display()))?;
            info!(path = %path.display(), n_assets = mapped.len(), "saved the map");
        }

        match self.format {
            OutputFormat::Table => {
                println!("{}", build_summary_table(&estimate, &self.currency));
                println!("{}", build_assets_table(&estimate, &locations, self.top, &self.currency));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            }
        }
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn parse(acceptances: &Path) -> Result<EstimateArgs> {
        Ok(EstimateArgs::try_parse_from([
            "estimate",
            "--acceptances",
            acceptances.to_str().unwrap(),
        ])?)
    }

    #[test]
    fn test_missing_store_hints_fetch() -> Result {
        let directory = tempfile::tempdir()?;
        let error = parse(&directory.path().join("raw_acceptances.csv"))?
            .load_acceptances()
            .unwrap_err();
        assert!(error.to_string().contains("run `fetch` first"), "{error:#}");
        Ok(())
    }

    #[test]
    fn test_malformed_store_is_not_missing() -> Result {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("raw_acceptances.csv");
        fs::write(&path, "bmUnitId,timeFrom\nT_A-1,2024-01-24T00:00:00Z,extra\n")?;
        let error = parse(&path)?.load_acceptances().unwrap_err();
        assert!(!error.to_string().contains("run `fetch` first"), "{error:#}");
        assert!(matches!(
            error.downcast_ref::<StoreError>(),
            Some(StoreError::Csv { .. })
        ));
        Ok(())
    }
}
