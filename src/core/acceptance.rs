use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::{
    prelude::*,
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
    store::{AcceptanceTable, BM_UNIT_ID, LEVEL_FROM, LEVEL_TO, TIME_FROM, TIME_TO},
};

/// One bid-offer acceptance: a power level ramp instructed to a BM unit.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptanceRecord {
    pub bm_unit_id: String,
    pub time_from: DateTime<Utc>,
    pub time_to: DateTime<Utc>,
    pub level_from: Megawatts,
    pub level_to: Megawatts,
}

impl AcceptanceRecord {
    /// Attach the derived duration, volume and delta.
    ///
    /// Records whose end is not strictly after the start are rejected: a non-positive duration
    /// would flip or zero the sign of the volume and silently skew the aggregates.
    pub fn enrich(self) -> Result<EnrichedRecord, RejectReason> {
        let duration = Hours::from(self.time_to - self.time_from);
        if duration.is_sign_negative() {
            return Err(RejectReason::NegativeDuration);
        }
        if duration == Hours::ZERO {
            return Err(RejectReason::ZeroDuration);
        }
        Ok(EnrichedRecord {
            volume: trapezoidal_volume(self.level_from, self.level_to, duration),
            delta: self.level_to - self.level_from,
            duration,
            record: self,
        })
    }
}

/// Two-point trapezoidal integral of the instructed power over the instruction window.
///
/// Exact for a linear ramp between the two levels.
pub fn trapezoidal_volume(
    level_from: Megawatts,
    level_to: Megawatts,
    duration: Hours,
) -> MegawattHours {
    ((level_from + level_to) / 2.0) * duration
}

#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedRecord {
    pub record: AcceptanceRecord,

    pub duration: Hours,

    /// Signed energy volume, its sign follows the sign of the levels.
    pub volume: MegawattHours,

    /// `level_to - level_from`, negative for a turn-down.
    pub delta: Megawatts,
}

impl EnrichedRecord {
    pub fn is_turn_down(&self) -> bool {
        self.delta.is_sign_negative()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", content = "field", rename_all = "camelCase")]
pub enum RejectReason {
    #[error("end time precedes start time")]
    NegativeDuration,

    #[error("zero duration")]
    ZeroDuration,

    /// The named field is missing or cannot be parsed.
    #[error("malformed `{0}`")]
    Malformed(&'static str),
}

/// Row of the acceptance table that did not make it into the estimate.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// Zero-based data row index in the acceptance table.
    pub row: usize,

    pub bm_unit_id: String,

    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Column positions of the fields the estimator needs.
struct Columns {
    bm_unit_id: usize,
    time_from: usize,
    time_to: usize,
    level_from: usize,
    level_to: usize,
}

/// Type and enrich every row of the table, keeping the rejects apart.
///
/// Fails only when one of the required columns is absent.
pub fn enrich_table(table: &AcceptanceTable) -> Result<(Vec<EnrichedRecord>, Vec<RejectedRow>)> {
    let columns = Columns {
        bm_unit_id: table.require_column(BM_UNIT_ID)?,
        time_from: table.require_column(TIME_FROM)?,
        time_to: table.require_column(TIME_TO)?,
        level_from: table.require_column(LEVEL_FROM)?,
        level_to: table.require_column(LEVEL_TO)?,
    };
    let mut enriched = Vec::with_capacity(table.len());
    let mut rejected = Vec::new();
    for (index, row) in table.rows().iter().enumerate() {
        match parse_row(row, &columns).and_then(AcceptanceRecord::enrich) {
            Ok(record) => enriched.push(record),
            Err(reason) => {
                let bm_unit_id = row.get(columns.bm_unit_id).cloned().unwrap_or_default();
                warn!(row = index, %bm_unit_id, %reason, "rejected");
                rejected.push(RejectedRow { row: index, bm_unit_id, reason });
            }
        }
    }
    Ok((enriched, rejected))
}

fn parse_row(row: &[String], columns: &Columns) -> Result<AcceptanceRecord, RejectReason> {
    let field = |index: usize, name: &'static str| {
        row.get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or(RejectReason::Malformed(name))
    };
    let level = |index: usize, name: &'static str| {
        field(index, name)?
            .parse::<f64>()
            .ok()
            .filter(|level| level.is_finite())
            .map(Megawatts::from)
            .ok_or(RejectReason::Malformed(name))
    };
    let time = |index: usize, name: &'static str| {
        parse_timestamp(field(index, name)?).ok_or(RejectReason::Malformed(name))
    };
    Ok(AcceptanceRecord {
        bm_unit_id: field(columns.bm_unit_id, BM_UNIT_ID)?.to_owned(),
        time_from: time(columns.time_from, TIME_FROM)?,
        time_to: time(columns.time_to, TIME_TO)?,
        level_from: level(columns.level_from, LEVEL_FROM)?,
        level_to: level(columns.level_to, LEVEL_TO)?,
    })
}

/// Parse RFC 3339, the space-separated form pandas writes, or a zone-less timestamp taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    if let Ok(timestamp) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(timestamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|timestamp| timestamp.and_utc())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    fn record(hours_from: i64, hours_to: i64, level_from: f64, level_to: f64) -> AcceptanceRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 24, 0, 0, 0).unwrap();
        AcceptanceRecord {
            bm_unit_id: "T_TEST-1".to_owned(),
            time_from: start + chrono::TimeDelta::hours(hours_from),
            time_to: start + chrono::TimeDelta::hours(hours_to),
            level_from: Megawatts::from(level_from),
            level_to: Megawatts::from(level_to),
        }
    }

    #[test]
    fn test_flat_level_volume() {
        // 700 kW held for 12 hours.
        let volume =
            trapezoidal_volume(Megawatts::from(0.7), Megawatts::from(0.7), Hours::from(12.0));
        assert_abs_diff_eq!(volume.0, 8.4, epsilon = 1e-12);
    }

    #[test]
    fn test_ramp_volume() -> Result {
        let enriched = record(0, 1, 100.0, 50.0).enrich()?;
        assert_abs_diff_eq!(enriched.duration.0, 1.0);
        assert_abs_diff_eq!(enriched.volume.0, 75.0);
        assert_abs_diff_eq!(enriched.delta.0, -50.0);
        assert!(enriched.is_turn_down());
        Ok(())
    }

    #[test]
    fn test_opposite_ramps_have_equal_volume() -> Result {
        let down = record(0, 2, 120.0, 80.0).enrich()?;
        let up = record(0, 2, 80.0, 120.0).enrich()?;
        assert_abs_diff_eq!(down.delta.0, -up.delta.0);
        assert_abs_diff_eq!(down.volume.0, up.volume.0);
        assert_abs_diff_eq!(down.volume.0, 200.0);
        Ok(())
    }

    #[test]
    fn test_negative_levels_give_negative_volume() -> Result {
        let enriched = record(0, 1, -100.0, -50.0).enrich()?;
        assert_abs_diff_eq!(enriched.volume.0, -75.0);
        assert!(!enriched.is_turn_down());
        Ok(())
    }

    #[test]
    fn test_reversed_times_are_rejected() {
        assert_eq!(record(2, 1, 10.0, 10.0).enrich(), Err(RejectReason::NegativeDuration));
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        assert_eq!(record(1, 1, 10.0, 10.0).enrich(), Err(RejectReason::ZeroDuration));
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 24, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-24T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-24T11:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-24 10:30:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-24T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-24 10:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_enrich_table() -> Result {
        let table = AcceptanceTable::new(
            ["acceptanceNumber", "bmUnitId", "timeFrom", "timeTo", "levelFrom", "levelTo"]
                .map(String::from)
                .to_vec(),
            vec![
                ["1", "T_A-1", "2024-01-24T00:00:00Z", "2024-01-24T01:00:00Z", "100", "50"]
                    .map(String::from)
                    .to_vec(),
                ["2", "T_A-1", "2024-01-24T02:00:00Z", "2024-01-24T01:00:00Z", "50", "50"]
                    .map(String::from)
                    .to_vec(),
                ["3", "T_B-1", "2024-01-24T00:00:00Z", "2024-01-24T01:00:00Z", "n/a", "50"]
                    .map(String::from)
                    .to_vec(),
                ["4", "", "2024-01-24T00:00:00Z", "2024-01-24T01:00:00Z", "1", "1"]
                    .map(String::from)
                    .to_vec(),
            ],
        );
        let (enriched, rejected) = enrich_table(&table)?;
        assert_eq!(enriched.len(), 1);
        assert_abs_diff_eq!(enriched[0].volume.0, 75.0);
        assert_eq!(
            rejected.iter().map(|row| (row.row, row.reason.clone())).collect::<Vec<_>>(),
            [
                (1, RejectReason::NegativeDuration),
                (2, RejectReason::Malformed(LEVEL_FROM)),
                (3, RejectReason::Malformed(BM_UNIT_ID)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_enrich_table_without_level_column() {
        let table = AcceptanceTable::new(
            ["bmUnitId", "timeFrom", "timeTo", "levelFrom"].map(String::from).to_vec(),
            Vec::new(),
        );
        assert!(enrich_table(&table).is_err());
    }
}
