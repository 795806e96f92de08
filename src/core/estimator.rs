use std::{cmp::Reverse, fs, path::Path};

use bon::Builder;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::{
    core::{
        acceptance::{EnrichedRecord, RejectedRow, enrich_table},
        classifier::AssetFilter,
    },
    prelude::*,
    quantity::{cost::Cost, energy::MegawattHours, rate::MegawattHourRate, time::Hours},
    store::AcceptanceTable,
};

/// Which classified acceptances count as grid interventions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InterventionPolicy {
    /// Every classified acceptance is an intervention.
    #[default]
    AllWind,

    /// Only turn-down instructions (`levelTo < levelFrom`) are interventions.
    ///
    /// When there are none, all classified acceptances are used as a proxy instead.
    TurnDown,
}

#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct Estimator {
    #[builder(default = MegawattHourRate::DEFAULT)]
    price: MegawattHourRate,

    #[builder(default)]
    policy: InterventionPolicy,
}

/// Per-asset total.
#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAggregate {
    pub bm_unit_id: String,

    /// Magnitude of the summed volume.
    #[serde(rename = "volumeMwh")]
    pub volume: MegawattHours,

    #[serde(rename = "estimatedCost")]
    pub cost: Cost,
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    /// Ordered by volume, largest first.
    pub assets: Vec<AssetAggregate>,

    /// Magnitude of the summed volume across all interventions.
    #[serde(rename = "totalVolumeMwh")]
    pub total_volume: MegawattHours,

    pub total_cost: Cost,

    #[serde(rename = "pricePerMwh")]
    pub price: MegawattHourRate,

    pub policy: InterventionPolicy,

    /// The turn-down filter matched nothing and all classified acceptances were used instead.
    pub fallback_applied: bool,

    /// Acceptances that passed typing and validation.
    pub n_records: usize,

    /// Acceptances that passed the asset filter.
    pub n_classified: usize,

    pub n_interventions: usize,

    pub rejected: Vec<RejectedRow>,
}

impl Estimate {
    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Save the per-asset totals as `bmUnitId,volumeMwh,estimatedCost`.
    #[instrument(skip_all, fields(path = %path.display(), n_assets = self.n_assets()))]
    pub fn write_assets_to(&self, path: &Path) -> Result {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        writer.write_record(["bmUnitId", "volumeMwh", "estimatedCost"])?;
        for asset in &self.assets {
            writer.serialize(asset)?;
        }
        writer.flush()?;
        info!("saved");
        Ok(())
    }
}

impl Estimator {
    /// Type, validate, filter, aggregate and price the acceptance table.
    ///
    /// Fails only when the table lacks one of the required columns.
    #[instrument(skip_all, fields(price = %self.price, policy = ?self.policy))]
    pub fn estimate(&self, table: &AcceptanceTable, filter: &AssetFilter) -> Result<Estimate> {
        let (records, rejected) = enrich_table(table)?;
        info!(n_records = records.len(), n_rejected = rejected.len(), "typed");
        Ok(self.estimate_records(records, rejected, filter))
    }

    pub fn estimate_records(
        &self,
        records: Vec<EnrichedRecord>,
        rejected: Vec<RejectedRow>,
        filter: &AssetFilter,
    ) -> Estimate {
        let n_records = records.len();
        let classified: Vec<EnrichedRecord> = records
            .into_iter()
            .filter(|record| filter.accepts(&record.record.bm_unit_id))
            .collect();
        let n_classified = classified.len();
        info!(n_classified, "filtered by asset");

        let (interventions, fallback_applied) = self.select_interventions(classified);
        let n_interventions = interventions.len();
        let duration = interventions.iter().map(|record| record.duration).sum::<Hours>();
        info!(n_interventions, %duration, fallback_applied, "selected interventions");

        let total_volume =
            interventions.iter().map(|record| record.volume).sum::<MegawattHours>().abs();
        let assets = interventions
            .into_iter()
            .into_grouping_map_by(|record| record.record.bm_unit_id.clone())
            .fold(MegawattHours::ZERO, |sum, _, record| sum + record.volume)
            .into_iter()
            .map(|(bm_unit_id, volume)| {
                let volume = volume.abs();
                AssetAggregate { bm_unit_id, volume, cost: volume * self.price }
            })
            .sorted_by(|lhs, rhs| {
                Reverse(OrderedFloat(lhs.volume.0))
                    .cmp(&Reverse(OrderedFloat(rhs.volume.0)))
                    .then_with(|| lhs.bm_unit_id.cmp(&rhs.bm_unit_id))
            })
            .collect_vec();

        let estimate = Estimate {
            total_cost: total_volume * self.price,
            total_volume,
            price: self.price,
            policy: self.policy,
            fallback_applied,
            n_records,
            n_classified,
            n_interventions,
            assets,
            rejected,
        };
        info!(
            total_volume = %estimate.total_volume,
            total_cost = %estimate.total_cost,
            n_assets = estimate.n_assets(),
            "estimated",
        );
        estimate
    }

    fn select_interventions(&self, classified: Vec<EnrichedRecord>) -> (Vec<EnrichedRecord>, bool) {
        match self.policy {
            InterventionPolicy::AllWind => (classified, false),
            InterventionPolicy::TurnDown => {
                let (turn_downs, others): (Vec<_>, Vec<_>) =
                    classified.into_iter().partition(EnrichedRecord::is_turn_down);
                if turn_downs.is_empty() && !others.is_empty() {
                    warn!("no turn-down instructions, using all classified acceptances as a proxy");
                    (others, true)
                } else {
                    (turn_downs, false)
                }
            }
        }
    }
}
