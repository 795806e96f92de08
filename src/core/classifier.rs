use std::collections::BTreeSet;

use bon::Builder;

use crate::{
    prelude::*,
    reference::{ReferenceError, ReferenceTable},
};

/// Names of the reference table columns the classifier looks at.
#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct ClassifierColumns {
    #[builder(into, default = "BMRS FUEL TYPE".to_owned())]
    pub fuel_type: String,

    /// Registry identifier.
    #[builder(into, default = "NESO BMU ID".to_owned())]
    pub registry_id: String,

    /// Settlement unit identifier.
    #[builder(into, default = "SETT UNIT ID".to_owned())]
    pub settlement_id: String,
}

impl Default for ClassifierColumns {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Identifiers of the BM units that belong to one fuel category.
///
/// Both naming schemes are unioned, because acceptances may reference a unit by either of them.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitSet(BTreeSet<String>);

impl UnitSet {
    #[instrument(skip_all, fields(fuel_type = fuel_type))]
    pub fn classify(
        table: &ReferenceTable,
        columns: &ClassifierColumns,
        fuel_type: &str,
    ) -> Result<Self, ReferenceError> {
        let fuel_column = table.column(&columns.fuel_type)?;
        let registry_column = table.column(&columns.registry_id)?;
        let settlement_column = table.column(&columns.settlement_id)?;

        let is_target: Vec<bool> = table
            .cells(fuel_column)
            .map(|fuel| fuel.is_some_and(|fuel| fuel == fuel_type.trim()))
            .collect();
        let ids_in = |column: usize| -> BTreeSet<String> {
            table
                .cells(column)
                .zip(&is_target)
                .filter_map(|(id, is_target)| id.filter(|_| *is_target))
                .map(str::to_owned)
                .collect()
        };

        let registry_ids = ids_in(registry_column);
        let settlement_ids = ids_in(settlement_column);
        info!(
            n_registry_ids = registry_ids.len(),
            n_settlement_ids = settlement_ids.len(),
            "collected identifiers",
        );
        let ids: BTreeSet<String> = registry_ids.union(&settlement_ids).cloned().collect();
        info!(n_units = ids.len(), "classified");
        Ok(Self(ids))
    }

    pub fn contains(&self, bm_unit_id: &str) -> bool {
        self.0.contains(bm_unit_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for UnitSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Which acceptances the estimator keeps by asset.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetFilter {
    /// Keep only the acceptances of these units.
    Units(UnitSet),

    /// Keep every acceptance.
    Unfiltered,
}

impl AssetFilter {
    /// An empty unit set would filter everything out, so it deliberately means «no filter».
    pub fn from_units(units: UnitSet) -> Self {
        if units.is_empty() {
            warn!("the unit set is empty, proceeding with all acceptances");
            Self::Unfiltered
        } else {
            info!(n_units = units.len(), "filtering by units");
            Self::Units(units)
        }
    }

    pub fn accepts(&self, bm_unit_id: &str) -> bool {
        match self {
            Self::Units(units) => units.contains(bm_unit_id),
            Self::Unfiltered => true,
        }
    }
}
