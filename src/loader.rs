use crate::config::Settings;
use crate::error::Result;
use crate::locale::{parse_br_str, parse_month};
use crate::schema::ColumnMap;
use crate::types::Observation;
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    /// Rows dropped for a missing region, an unreadable period or a broken record.
    pub skipped_rows: usize,
    /// Attempts cells that could not be parsed; the row is kept with no value.
    pub unparseable_values: usize,
    pub regions: usize,
}

pub fn load_observations<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
) -> Result<(Vec<Observation>, LoadReport)> {
    let file = std::fs::File::open(path.as_ref())?;
    read_observations(file, delimiter)
}

/// Parse a feed from any reader. A header that cannot be mapped to the
/// required columns fails before any row is read.
pub fn read_observations<R: Read>(
    reader: R,
    delimiter: u8,
) -> Result<(Vec<Observation>, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let columns = ColumnMap::resolve(rdr.headers()?)?;

    let mut report = LoadReport::default();
    let mut observations = Vec::new();
    let mut regions: HashSet<String> = HashSet::new();

    for result in rdr.records() {
        report.total_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(row = report.total_rows, error = %e, "Skipping unreadable record");
                report.skipped_rows += 1;
                continue;
            }
        };

        let region = record.get(columns.region).unwrap_or("").trim().to_uppercase();
        if region.is_empty() {
            report.skipped_rows += 1;
            continue;
        }
        let month = match record.get(columns.period).and_then(parse_month) {
            Some(m) => m,
            None => {
                tracing::debug!(row = report.total_rows, region = %region, "Skipping row with unreadable period");
                report.skipped_rows += 1;
                continue;
            }
        };

        let value = parse_br_str(record.get(columns.attempts));
        if value.is_none() {
            report.unparseable_values += 1;
        }
        let converted = columns
            .converted
            .and_then(|idx| parse_br_str(record.get(idx)));

        regions.insert(region.clone());
        observations.push(Observation { region, month, value, converted });
    }

    report.loaded_rows = observations.len();
    report.regions = regions.len();
    tracing::info!(
        total = report.total_rows,
        loaded = report.loaded_rows,
        skipped = report.skipped_rows,
        unparseable = report.unparseable_values,
        regions = report.regions,
        "Feed loaded"
    );
    Ok((observations, report))
}

/// Keep the selected regions (all when none are selected) inside the
/// inclusive date range.
pub fn apply_filters(observations: &[Observation], settings: &Settings) -> Vec<Observation> {
    let selected: HashSet<String> = settings
        .regions
        .iter()
        .map(|r| r.trim().to_uppercase())
        .collect();
    observations
        .iter()
        .filter(|o| selected.is_empty() || selected.contains(&o.region))
        .filter(|o| settings.start.map_or(true, |s| o.month >= s))
        .filter(|o| settings.end.map_or(true, |e| o.month <= e))
        .cloned()
        .collect()
}

/// Regions in order of first appearance. This is the tie-break order used by
/// rankings.
pub fn regions_in_order(observations: &[Observation]) -> Vec<String> {
    let mut seen = HashSet::new();
    observations
        .iter()
        .filter(|o| seen.insert(o.region.as_str()))
        .map(|o| o.region.clone())
        .collect()
}
