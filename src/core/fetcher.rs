use std::{path::Path, thread::sleep, time::Duration};

use chrono::NaiveDate;
use serde_json::Value;

use crate::{
    prelude::*,
    store::{AcceptanceTable, BM_UNIT_ID, LEADING_COLUMNS},
};

/// Number of half-hourly settlement periods the upstream splits a day into.
pub const N_SETTLEMENT_PERIODS: u8 = 48;

/// Field name some upstream endpoints use for the BM unit identifier.
const UPSTREAM_BM_UNIT: &str = "bmUnit";

/// One acceptance object as returned by the upstream.
pub type RawRecord = serde_json::Map<String, Value>;

/// Anything that can return the acceptances of one settlement period.
pub trait AcceptanceSource {
    fn get_period(&self, date: NaiveDate, period: u8) -> Result<Vec<RawRecord>>;
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every period answered and there is data.
    Complete,

    /// Some periods failed, the rest returned data.
    Partial { failed_periods: Vec<u8> },

    /// Every period answered, but none of them had any acceptances.
    NoData,

    /// Nothing was retrieved and at least one period failed.
    TotalFailure { failed_periods: Vec<u8> },
}

impl FetchOutcome {
    pub const fn has_data(&self) -> bool {
        matches!(self, Self::Complete | Self::Partial { .. })
    }
}

#[must_use]
pub struct FetchReport {
    pub date: NaiveDate,
    pub table: AcceptanceTable,
    pub outcome: FetchOutcome,
}

impl FetchReport {
    /// Overwrite the store with the fetched table.
    ///
    /// Nothing is written when there is no data, so that a failed run does not wipe out a previous
    /// good one. Returns whether the file was written.
    pub fn persist(&self, path: &Path) -> Result<bool> {
        if !self.outcome.has_data() {
            warn!(
                date = %self.date,
                outcome = ?self.outcome,
                path = %path.display(),
                "nothing to save",
            );
            return Ok(false);
        }
        self.table
            .write_to(path)
            .with_context(|| format!("failed to save the acceptances to `{}`", path.display()))?;
        Ok(true)
    }
}

pub struct Fetcher<S> {
    source: S,

    /// Pause between consecutive period requests.
    delay: Duration,
}

impl<S: AcceptanceSource> Fetcher<S> {
    pub const fn new(source: S, delay: Duration) -> Self {
        Self { source, delay }
    }

    /// Fetch all settlement periods of the day, one request per period.
    ///
    /// A failing period is logged and skipped, it never aborts the day.
    #[instrument(skip_all, fields(date = %date))]
    pub fn fetch_day(&self, date: NaiveDate) -> FetchReport {
        info!("fetching {N_SETTLEMENT_PERIODS} settlement periods…");
        let mut records = Vec::new();
        let mut failed_periods = Vec::new();
        for period in 1..=N_SETTLEMENT_PERIODS {
            if period != 1 && !self.delay.is_zero() {
                sleep(self.delay);
            }
            match self.source.get_period(date, period) {
                Ok(period_records) => {
                    if period % 10 == 0 {
                        info!(period, n_records = period_records.len(), "fetched");
                    }
                    records.extend(period_records);
                }
                Err(error) => {
                    warn!(period, "failed to fetch the period: {error:#}");
                    failed_periods.push(period);
                }
            }
        }

        let outcome = match (records.is_empty(), failed_periods.is_empty()) {
            (false, true) => FetchOutcome::Complete,
            (false, false) => FetchOutcome::Partial { failed_periods },
            (true, true) => FetchOutcome::NoData,
            (true, false) => FetchOutcome::TotalFailure { failed_periods },
        };
        let table = normalize(records);
        info!(n_records = table.len(), ?outcome, "fetched the day");
        FetchReport { date, table, outcome }
    }
}

/// Flatten the upstream objects into a table with a consistent identifier column.
///
/// The well-known columns come first, then every other field in the order it was first seen.
pub fn normalize(records: Vec<RawRecord>) -> AcceptanceTable {
    let records: Vec<RawRecord> = records.into_iter().map(rename_bm_unit).collect();

    let mut header: Vec<String> = LEADING_COLUMNS.map(String::from).to_vec();
    for record in &records {
        for key in record.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| header.iter().map(|column| render_cell(record.get(column))).collect())
        .collect();
    AcceptanceTable::new(header, rows)
}

fn rename_bm_unit(mut record: RawRecord) -> RawRecord {
    if !record.contains_key(BM_UNIT_ID)
        && let Some(bm_unit) = record.remove(UPSTREAM_BM_UNIT)
    {
        record.insert(BM_UNIT_ID.to_owned(), bm_unit);
    }
    record
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(value)) => value.clone(),
        Some(value) => value.to_string(),
    }
}
