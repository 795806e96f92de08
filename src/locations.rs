use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    core::estimator::{AssetAggregate, Estimate},
    prelude::*,
};

/// Map dot size is the volume scaled down by this factor.
const SIZE_DIVISOR: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
}

/// Coordinates of the known assets, keyed by BM unit identifier.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Locations {
    #[serde(default)]
    pub assets: BTreeMap<String, Location>,
}

impl Locations {
    /// Read the lookup, a missing file means an empty one.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        if !path.is_file() {
            warn!("no locations file, the map will be empty");
            return Ok(Self::default());
        }
        let locations: Self = toml::from_slice(
            &fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?,
        )
        .with_context(|| format!("failed to parse `{}`", path.display()))?;
        debug!(n_assets = locations.assets.len(), "loaded");
        Ok(locations)
    }

    pub fn get(&self, bm_unit_id: &str) -> Option<&Location> {
        self.assets.get(bm_unit_id)
    }

    /// Join the per-asset totals with the coordinates, in the estimate order.
    ///
    /// Assets without coordinates are left out.
    pub fn map(&self, estimate: &Estimate) -> Vec<MappedAsset> {
        let mapped: Vec<MappedAsset> = estimate
            .assets
            .iter()
            .filter_map(|asset| Some(MappedAsset::new(asset, self.get(&asset.bm_unit_id)?)))
            .collect();
        let n_unmapped = estimate.assets.len() - mapped.len();
        if n_unmapped != 0 {
            info!(n_mapped = mapped.len(), n_unmapped, "some assets have no coordinates");
        }
        mapped
    }
}

/// One dot on the curtailment map.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedAsset {
    pub bm_unit_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub volume_mwh: f64,
    pub size: f64,
}

impl MappedAsset {
    fn new(asset: &AssetAggregate, location: &Location) -> Self {
        Self {
            bm_unit_id: asset.bm_unit_id.clone(),
            name: location.name.clone(),
            lat: location.lat,
            lon: location.lon,
            volume_mwh: asset.volume.0,
            size: asset.volume.0 / SIZE_DIVISOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        core::{classifier::AssetFilter, estimator::Estimator},
        store::AcceptanceTable,
    };

    // language=TOML
    const LOCATIONS: &str = r#"
        [assets."T_HOWAO-1"]
        lat = 53.8
        lon = 1.9
        name = "Hornsea 1"

        [assets."T_GYM-1"]
        lat = 53.4
        lon = -3.6
        name = "Gwynt y Môr"
    "#;

    fn estimate() -> Result<Estimate> {
        let table = AcceptanceTable::new(
            ["bmUnitId", "timeFrom", "timeTo", "levelFrom", "levelTo"].map(String::from).to_vec(),
            [
                ["T_HOWAO-1", "2024-01-24T00:00:00Z", "2024-01-24T01:00:00Z", "300", "300"],
                ["T_GYM-1", "2024-01-24T00:00:00Z", "2024-01-24T01:00:00Z", "50", "50"],
                ["T_NOWHERE-1", "2024-01-24T00:00:00Z", "2024-01-24T01:00:00Z", "100", "100"],
            ]
            .into_iter()
            .map(|row| row.map(String::from).to_vec())
            .collect(),
        );
        Estimator::builder().build().estimate(&table, &AssetFilter::Unfiltered)
    }

    #[test]
    fn test_parse() -> Result {
        let locations: Locations = toml::from_str(LOCATIONS)?;
        assert_eq!(locations.assets.len(), 2);
        let location = locations.get("T_GYM-1").unwrap();
        assert_eq!(location.name, "Gwynt y Môr");
        assert_abs_diff_eq!(location.lon, -3.6);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_empty() -> Result {
        let directory = tempfile::tempdir()?;
        let locations = Locations::read_from(&directory.path().join("locations.toml"))?;
        assert!(locations.assets.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_from_file() -> Result {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("locations.toml");
        fs::write(&path, LOCATIONS)?;
        assert_eq!(Locations::read_from(&path)?, toml::from_str(LOCATIONS)?);
        Ok(())
    }

    #[test]
    fn test_map_skips_unknown_assets() -> Result {
        let locations: Locations = toml::from_str(LOCATIONS)?;
        let mapped = locations.map(&estimate()?);
        assert_eq!(
            mapped.iter().map(|asset| asset.bm_unit_id.as_str()).collect::<Vec<_>>(),
            ["T_HOWAO-1", "T_GYM-1"],
        );
        assert_abs_diff_eq!(mapped[0].volume_mwh, 300.0);
        assert_abs_diff_eq!(mapped[0].size, 3.0);
        assert_eq!(mapped[1].name, "Gwynt y Môr");
        Ok(())
    }

    #[test]
    fn test_map_json_field_names() -> Result {
        let locations: Locations = toml::from_str(LOCATIONS)?;
        let json = serde_json::to_value(&locations.map(&estimate()?)[0])?;
        assert_eq!(json["bmUnitId"], "T_HOWAO-1");
        assert_eq!(json["volumeMwh"], 300.0);
        assert_eq!(json["lat"], 53.8);
        Ok(())
    }
}
