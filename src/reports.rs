// One full dashboard refresh: forecast every region, rank them and shape the
// artifacts the rendering layer consumes.
use crate::aggregate::{build_ranking, conversion_rates, RankingSpec};
use crate::cache::ForecastCache;
use crate::config::Settings;
use crate::error::Result;
use crate::forecast::{brazilian_holidays, forecast_regions, projection_totals, ForecastBatch, Forecaster};
use crate::loader::{apply_filters, regions_in_order};
use crate::output::{self, chart_series, conversion_table, projection_export};
use crate::types::{ChartPoint, ConversionRow, Observation, ProjectionExportRow, RankingRow};
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashSet;
use std::path::PathBuf;

pub const CHART_FILE: &str = "serie_historica_projecao.json";
pub const PROJECTION_FILE: &str = "projecao_mensal.csv";
pub const RANKING_CSV_FILE: &str = "ranking_ufs.csv";
pub const RANKING_JSON_FILE: &str = "ranking_ufs.json";
pub const CONVERSION_FILE: &str = "conversao_anual.csv";

#[derive(Debug, Clone)]
pub struct Reports {
    pub regions: Vec<String>,
    pub batch: ForecastBatch,
    pub chart: Vec<ChartPoint>,
    pub projection: Vec<ProjectionExportRow>,
    pub ranking: Vec<RankingRow>,
    pub conversions: Vec<ConversionRow>,
}

/// Regions to report on: the configured selection (upper-cased, first
/// occurrence kept), or every region in the feed in first-appearance order.
pub fn selected_regions(observations: &[Observation], settings: &Settings) -> Vec<String> {
    if settings.regions.is_empty() {
        return regions_in_order(observations);
    }
    let mut seen = HashSet::new();
    settings
        .regions
        .iter()
        .map(|r| r.trim().to_uppercase())
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Regions the ranking covers: the selection first, then every other region
/// of the feed.
fn ranking_regions(observations: &[Observation], selected: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selected
        .iter()
        .cloned()
        .chain(regions_in_order(observations))
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// `observations` is the whole feed. The region selection and date range
/// apply to the chart, the projection export and the conversion view; the
/// ranking always covers every region over all of its years.
pub fn generate_reports(
    observations: &[Observation],
    settings: &Settings,
    forecaster: &dyn Forecaster,
    cache: &mut ForecastCache,
    now: DateTime<Utc>,
) -> Reports {
    let filtered = apply_filters(observations, settings);
    let regions = selected_regions(observations, settings);

    let holidays = if settings.include_holidays {
        let first = observations.iter().map(|o| o.month.year()).min().unwrap_or(settings.target_year);
        let last = observations.iter().map(|o| o.month.year()).max().unwrap_or(settings.target_year);
        // Cover the forecast horizon past the last observed year.
        brazilian_holidays(first..=last + 2)
    } else {
        Vec::new()
    };

    let purged = cache.purge_expired(now);
    if purged > 0 {
        tracing::debug!(purged, "Dropped expired forecasts");
    }
    let batch = forecast_regions(
        forecaster,
        cache,
        &filtered,
        &regions,
        settings.horizon_months,
        &holidays,
        now,
    );

    let universe = ranking_regions(observations, &regions);
    let full_batch = forecast_regions(
        forecaster,
        cache,
        observations,
        &universe,
        settings.horizon_months,
        &holidays,
        now,
    );
    let projections = projection_totals(&full_batch, settings.target_year);
    let spec = RankingSpec::from_settings(settings);
    let ranking = build_ranking(observations, &universe, &projections, &spec);

    let conversions: Vec<ConversionRow> = if filtered.iter().any(|o| o.converted.is_some()) {
        conversion_rates(&filtered)
    } else {
        Vec::new()
    };

    Reports {
        chart: chart_series(&filtered, &batch, &regions),
        projection: projection_export(&batch),
        regions,
        batch,
        ranking,
        conversions,
    }
}

/// Write every artifact into `settings.output_dir`; returns the paths written.
pub fn write_reports(reports: &Reports, settings: &Settings) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&settings.output_dir)?;
    let path = |name: &str| settings.output_dir.join(name);
    let mut written = Vec::new();

    output::write_json(&path(CHART_FILE), &reports.chart)?;
    written.push(path(CHART_FILE));
    output::write_csv(&path(PROJECTION_FILE), &reports.projection)?;
    written.push(path(PROJECTION_FILE));
    output::write_ranking_csv(&path(RANKING_CSV_FILE), &reports.ranking)?;
    written.push(path(RANKING_CSV_FILE));
    output::write_json(&path(RANKING_JSON_FILE), &reports.ranking)?;
    written.push(path(RANKING_JSON_FILE));
    if !reports.conversions.is_empty() {
        output::write_csv(&path(CONVERSION_FILE), &conversion_table(&reports.conversions))?;
        written.push(path(CONVERSION_FILE));
    }

    tracing::info!(files = written.len(), dir = %settings.output_dir.display(), "Reports written");
    Ok(written)
}
