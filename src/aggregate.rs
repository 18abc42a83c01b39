// Year aggregation and region rankings.
//
// Everything here is a pure function of the observations and the projection
// totals handed in; nothing is cached between calls.
use crate::config::{RankingView, Settings};
use crate::loader::regions_in_order;
use crate::types::{ConversionRow, DeltaValue, Observation, RankingRow, YearlyTotal};
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap, HashSet};

/// `a - b`, sign preserved.
pub fn signed_delta(a: f64, b: f64) -> f64 {
    a - b
}

/// How far `later` falls short of `earlier`; growth counts as zero decline.
pub fn decline(earlier: f64, later: f64) -> f64 {
    (earlier - later).max(0.0)
}

/// Per-region, per-year sums. Unparseable values are left out of the sum;
/// a (region, year) with no readable value has no entry.
fn totals_by_region(observations: &[Observation]) -> HashMap<&str, BTreeMap<i32, f64>> {
    let mut map: HashMap<&str, BTreeMap<i32, f64>> = HashMap::new();
    for o in observations {
        if let Some(v) = o.value {
            *map.entry(o.region.as_str())
                .or_default()
                .entry(o.month.year())
                .or_insert(0.0) += v;
        }
    }
    map
}

/// Yearly totals ordered by region first appearance, then year.
pub fn yearly_totals(observations: &[Observation]) -> Vec<YearlyTotal> {
    let by_region = totals_by_region(observations);
    regions_in_order(observations)
        .into_iter()
        .flat_map(|region| {
            let years = by_region.get(region.as_str()).cloned().unwrap_or_default();
            years.into_iter().map(move |(year, total)| YearlyTotal {
                region: region.clone(),
                year,
                total,
            })
        })
        .collect()
}

pub fn yearly_total(observations: &[Observation], region: &str, year: i32) -> f64 {
    observations
        .iter()
        .filter(|o| o.region == region && o.month.year() == year)
        .filter_map(|o| o.value)
        .sum()
}

/// A period a comparison can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Realized total of a calendar year.
    Actual(i32),
    /// Realized so far plus projected remainder of a year.
    Combined(i32),
}

impl Period {
    pub fn label(&self) -> String {
        match self {
            Period::Actual(y) => y.to_string(),
            Period::Combined(y) => format!("{}*", y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMode {
    /// `value(a) - value(b)`.
    Signed,
    /// `max(0, value(a) - value(b))`, with `a` the earlier period.
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub a: Period,
    pub b: Period,
    pub mode: DeltaMode,
}

impl Comparison {
    pub fn label(&self) -> String {
        match self.mode {
            DeltaMode::Signed => format!("Δ {}-{}", self.a.label(), self.b.label()),
            DeltaMode::Decline => format!("Queda {}-{}", self.a.label(), self.b.label()),
        }
    }

    fn evaluate(&self, values: &RegionValues) -> f64 {
        let (a, b) = (values.get(self.a), values.get(self.b));
        match self.mode {
            DeltaMode::Signed => signed_delta(a, b),
            DeltaMode::Decline => decline(a, b),
        }
    }
}

/// What a ranking compares and how rows are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingSpec {
    /// Years whose actual totals are reported on every row.
    pub actual_years: Vec<i32>,
    /// Year split into realized and projected parts.
    pub target_year: i32,
    pub comparisons: Vec<Comparison>,
    /// Drop rows whose two most recent full years sum to zero or less.
    pub exclude_insufficient: bool,
}

impl RankingSpec {
    /// Signed `target* - baseline` per baseline, most recent baseline first.
    pub fn growth(target_year: i32, baselines: &[i32]) -> Self {
        Self::build(target_year, baselines, |base| Comparison {
            a: Period::Combined(target_year),
            b: Period::Actual(base),
            mode: DeltaMode::Signed,
        })
    }

    /// Clamped `baseline - target*` per baseline, most recent baseline first.
    pub fn decline(target_year: i32, baselines: &[i32]) -> Self {
        Self::build(target_year, baselines, |base| Comparison {
            a: Period::Actual(base),
            b: Period::Combined(target_year),
            mode: DeltaMode::Decline,
        })
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut spec = match settings.view {
            RankingView::Growth => Self::growth(settings.target_year, &settings.baseline_years),
            RankingView::Decline => Self::decline(settings.target_year, &settings.baseline_years),
        };
        spec.exclude_insufficient = settings.exclude_insufficient;
        spec
    }

    fn build(target_year: i32, baselines: &[i32], cmp: impl Fn(i32) -> Comparison) -> Self {
        let mut years = baselines.to_vec();
        years.sort_unstable();
        years.dedup();
        let comparisons = years.iter().rev().map(|y| cmp(*y)).collect();
        RankingSpec {
            actual_years: years,
            target_year,
            comparisons,
            exclude_insufficient: false,
        }
    }
}

struct RegionValues<'a> {
    years: Option<&'a BTreeMap<i32, f64>>,
    target_year: i32,
    projected: f64,
}

impl RegionValues<'_> {
    fn actual(&self, year: i32) -> f64 {
        self.years.and_then(|y| y.get(&year)).copied().unwrap_or(0.0)
    }

    fn get(&self, period: Period) -> f64 {
        match period {
            Period::Actual(y) => self.actual(y),
            Period::Combined(y) if y == self.target_year => self.actual(y) + self.projected,
            // Only the target year carries a projection.
            Period::Combined(y) => self.actual(y),
        }
    }
}

/// True when the two most recent full years before the target sum to zero
/// or less.
pub fn insufficient_data(row: &RankingRow) -> bool {
    let mut full: Vec<(i32, f64)> = row
        .totals
        .iter()
        .copied()
        .filter(|(y, _)| *y < row.target_year)
        .collect();
    full.sort_by(|a, b| b.0.cmp(&a.0));
    full.iter().take(2).map(|(_, v)| v).sum::<f64>() <= 0.0
}

/// Build a ranking row for every region in `regions`, followed by any region
/// present only in `observations`.
///
/// Regions without a projection get `projected = 0`. Rows are sorted by
/// descending `sort_key` (the largest delta) with a stable sort, so ties keep
/// region order.
pub fn build_ranking(
    observations: &[Observation],
    regions: &[String],
    projections: &HashMap<String, f64>,
    spec: &RankingSpec,
) -> Vec<RankingRow> {
    let by_region = totals_by_region(observations);

    let mut seen = HashSet::new();
    let order: Vec<String> = regions
        .iter()
        .cloned()
        .chain(regions_in_order(observations))
        .filter(|r| seen.insert(r.clone()))
        .collect();

    let mut rows: Vec<RankingRow> = order
        .into_iter()
        .map(|region| {
            let projected = match projections.get(&region) {
                Some(p) => *p,
                None => {
                    tracing::debug!(region = %region, "No projection, defaulting to zero");
                    0.0
                }
            };
            let values = RegionValues {
                years: by_region.get(region.as_str()),
                target_year: spec.target_year,
                projected,
            };
            let deltas: Vec<DeltaValue> = spec
                .comparisons
                .iter()
                .map(|c| DeltaValue { label: c.label(), value: c.evaluate(&values) })
                .collect();
            let sort_key = deltas
                .iter()
                .map(|d| d.value)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
                .unwrap_or(0.0);
            let realized = values.actual(spec.target_year);
            RankingRow {
                totals: spec.actual_years.iter().map(|y| (*y, values.actual(*y))).collect(),
                target_year: spec.target_year,
                realized,
                projected,
                combined: realized + projected,
                deltas,
                sort_key,
                region,
            }
        })
        .collect();

    if spec.exclude_insufficient {
        rows.retain(|r| !insufficient_data(r));
    }
    rows.sort_by(|a, b| b.sort_key.total_cmp(&a.sort_key));
    rows
}

/// Attempts, converted and conversion rate per (region, year).
pub fn conversion_rates(observations: &[Observation]) -> Vec<ConversionRow> {
    #[derive(Default)]
    struct Acc {
        attempts: f64,
        converted: f64,
        has_converted: bool,
    }
    let mut map: HashMap<(&str, i32), Acc> = HashMap::new();
    for o in observations {
        let e = map.entry((o.region.as_str(), o.month.year())).or_default();
        if let Some(v) = o.value {
            e.attempts += v;
        }
        if let Some(c) = o.converted {
            e.converted += c;
            e.has_converted = true;
        }
    }

    let mut rows: Vec<ConversionRow> = Vec::new();
    for region in regions_in_order(observations) {
        let mut years: Vec<i32> = map
            .keys()
            .filter(|(r, _)| *r == region)
            .map(|(_, y)| *y)
            .collect();
        years.sort_unstable();
        for year in years {
            let acc = &map[&(region.as_str(), year)];
            let rate = if acc.has_converted && acc.attempts > 0.0 {
                Some(acc.converted / acc.attempts)
            } else {
                None
            };
            rows.push(ConversionRow {
                region: region.clone(),
                year,
                attempts: acc.attempts,
                converted: acc.converted,
                rate,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(region: &str, y: i32, m: u32, value: Option<f64>) -> Observation {
        Observation {
            region: region.to_string(),
            month: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
            value,
            converted: None,
        }
    }

    fn regions(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn yearly_totals_sum_duplicates_and_skip_unparseable() {
        let data = vec![
            obs("SP", 2024, 1, Some(10.0)),
            obs("SP", 2024, 1, Some(5.0)),
            obs("SP", 2024, 2, None),
            obs("SP", 2023, 7, Some(1.0)),
            obs("RJ", 2024, 3, Some(2.0)),
        ];
        let totals = yearly_totals(&data);
        let flat: Vec<_> = totals.iter().map(|t| (t.region.as_str(), t.year, t.total)).collect();
        assert_eq!(flat, vec![("SP", 2023, 1.0), ("SP", 2024, 15.0), ("RJ", 2024, 2.0)]);
        assert_eq!(yearly_total(&data, "SP", 2024), 15.0);
        assert_eq!(yearly_total(&data, "SP", 2022), 0.0);
    }

    #[test]
    fn unparseable_only_year_has_no_total() {
        let data = vec![obs("AC", 2024, 1, None)];
        assert!(yearly_totals(&data).is_empty());
        assert_eq!(yearly_total(&data, "AC", 2024), 0.0);
    }

    #[test]
    fn decline_is_clamped_and_signed_is_not() {
        for (a, b) in [(10.0, 3.0), (3.0, 10.0), (0.0, 0.0), (-5.0, 2.0), (1e9, 1e9 - 1.0)] {
            assert_eq!(decline(a, b), (a - b).max(0.0));
            assert!(decline(a, b) >= 0.0);
            assert_eq!(signed_delta(a, b), a - b);
        }
        assert_eq!(signed_delta(3.0, 10.0), -7.0);
    }

    fn sp_scenario() -> Vec<Observation> {
        vec![
            obs("SP", 2023, 1, Some(600.0)),
            obs("SP", 2023, 6, Some(400.0)),
            obs("SP", 2024, 3, Some(800.0)),
        ]
    }

    #[test]
    fn sp_decline_scenario() {
        let projections = HashMap::from([("SP".to_string(), 900.0)]);
        let spec = RankingSpec::decline(2025, &[2023, 2024]);
        let rows = build_ranking(&sp_scenario(), &regions(&["SP"]), &projections, &spec);

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.totals, vec![(2023, 1000.0), (2024, 800.0)]);
        assert_eq!(row.realized, 0.0);
        assert_eq!(row.projected, 900.0);
        assert_eq!(row.combined, 900.0);
        // Most recent baseline first.
        assert_eq!(row.deltas[0].label, "Queda 2024-2025*");
        assert_eq!(row.deltas[0].value, 0.0);
        assert_eq!(row.deltas[1].label, "Queda 2023-2025*");
        assert_eq!(row.deltas[1].value, 100.0);
        assert_eq!(row.sort_key, 100.0);
    }

    #[test]
    fn combined_keeps_realized_and_projected_apart() {
        let mut data = sp_scenario();
        data.push(obs("SP", 2025, 1, Some(150.0)));
        let projections = HashMap::from([("SP".to_string(), 700.0)]);
        let spec = RankingSpec::growth(2025, &[2024]);
        let rows = build_ranking(&data, &[], &projections, &spec);
        assert_eq!(rows[0].realized, 150.0);
        assert_eq!(rows[0].projected, 700.0);
        assert_eq!(rows[0].combined, 850.0);
        assert_eq!(rows[0].deltas[0].label, "Δ 2025*-2024");
        assert_eq!(rows[0].deltas[0].value, 50.0);
    }

    #[test]
    fn growth_view_keeps_sign_and_sorts_descending() {
        let data = vec![
            obs("SP", 2024, 1, Some(100.0)),
            obs("RJ", 2024, 1, Some(100.0)),
            obs("MG", 2024, 1, Some(100.0)),
        ];
        let projections = HashMap::from([
            ("SP".to_string(), 50.0),
            ("RJ".to_string(), 300.0),
            ("MG".to_string(), 120.0),
        ]);
        let spec = RankingSpec::growth(2025, &[2024]);
        let rows = build_ranking(&data, &[], &projections, &spec);
        let order: Vec<_> = rows.iter().map(|r| (r.region.as_str(), r.sort_key)).collect();
        assert_eq!(order, vec![("RJ", 200.0), ("MG", 20.0), ("SP", -50.0)]);
    }

    #[test]
    fn missing_projection_defaults_to_zero_and_row_is_kept() {
        let data = vec![obs("SP", 2024, 1, Some(10.0)), obs("RJ", 2024, 1, Some(20.0))];
        let projections = HashMap::from([("SP".to_string(), 5.0)]);
        let spec = RankingSpec::decline(2025, &[2024]);
        let rows = build_ranking(&data, &[], &projections, &spec);
        let rj = rows.iter().find(|r| r.region == "RJ").unwrap();
        assert_eq!(rj.projected, 0.0);
        assert_eq!(rj.sort_key, 20.0);
    }

    #[test]
    fn region_without_history_is_listed_with_zeros_last() {
        let data = vec![obs("SP", 2024, 1, Some(10.0)), obs("RJ", 2024, 1, Some(20.0))];
        let spec = RankingSpec::decline(2025, &[2023, 2024]);
        let rows = build_ranking(&data, &regions(&["AC", "SP", "RJ"]), &HashMap::new(), &spec);

        let order: Vec<_> = rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(order, vec!["RJ", "SP", "AC"]);
        let ac = &rows[2];
        assert_eq!(ac.totals, vec![(2023, 0.0), (2024, 0.0)]);
        assert_eq!(ac.combined, 0.0);
        assert!(ac.deltas.iter().all(|d| d.value == 0.0));
        assert_eq!(ac.sort_key, 0.0);
    }

    #[test]
    fn repeated_regions_get_one_row() {
        let data = vec![obs("SP", 2024, 1, Some(10.0)), obs("RJ", 2024, 1, Some(20.0))];
        let spec = RankingSpec::decline(2025, &[2024]);
        let rows = build_ranking(&data, &regions(&["SP", "AC", "SP", "AC"]), &HashMap::new(), &spec);
        let order: Vec<_> = rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(order, vec!["RJ", "SP", "AC"]);
    }

    #[test]
    fn ties_keep_region_order() {
        let data = vec![
            obs("BA", 2024, 1, Some(10.0)),
            obs("PE", 2024, 1, Some(10.0)),
            obs("CE", 2024, 1, Some(10.0)),
        ];
        let spec = RankingSpec::decline(2025, &[2024]);
        let rows = build_ranking(&data, &[], &HashMap::new(), &spec);
        let order: Vec<_> = rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(order, vec!["BA", "PE", "CE"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let data: Vec<Observation> = ["SP", "RJ", "MG", "RS", "PR"]
            .iter()
            .enumerate()
            .flat_map(|(i, r)| {
                vec![
                    obs(r, 2023, 5, Some(100.0 + i as f64 * 7.0)),
                    obs(r, 2024, 5, Some(90.0 + (i % 2) as f64 * 20.0)),
                ]
            })
            .collect();
        let projections = HashMap::from([("MG".to_string(), 40.0), ("PR".to_string(), 95.0)]);
        let spec = RankingSpec::decline(2025, &[2023, 2024]);
        let first = build_ranking(&data, &[], &projections, &spec);
        let second = build_ranking(&data, &[], &projections, &spec);
        assert_eq!(first, second);
    }

    #[test]
    fn insufficient_rows_only_dropped_on_request() {
        let data = vec![
            obs("SP", 2023, 1, Some(10.0)),
            obs("AC", 2021, 1, Some(10.0)),
        ];
        let mut spec = RankingSpec::growth(2025, &[2023, 2024]);
        assert_eq!(build_ranking(&data, &[], &HashMap::new(), &spec).len(), 2);

        spec.exclude_insufficient = true;
        let rows = build_ranking(&data, &[], &HashMap::new(), &spec);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region, "SP");
    }

    #[test]
    fn no_comparisons_sort_key_is_zero() {
        let spec = RankingSpec {
            actual_years: vec![2024],
            target_year: 2025,
            comparisons: Vec::new(),
            exclude_insufficient: false,
        };
        let rows = build_ranking(&[obs("SP", 2024, 1, Some(3.0))], &[], &HashMap::new(), &spec);
        assert_eq!(rows[0].sort_key, 0.0);
    }

    #[test]
    fn spec_from_settings_respects_view() {
        let settings = Settings {
            target_year: 2025,
            baseline_years: vec![2024, 2023, 2024],
            view: RankingView::Decline,
            exclude_insufficient: true,
            ..Settings::default()
        };
        let spec = RankingSpec::from_settings(&settings);
        assert_eq!(spec.actual_years, vec![2023, 2024]);
        assert!(spec.exclude_insufficient);
        assert_eq!(spec.comparisons[0].a, Period::Actual(2024));
        assert_eq!(spec.comparisons[0].mode, DeltaMode::Decline);
    }

    #[test]
    fn conversion_rate_per_region_year() {
        let mut data = vec![
            obs("SP", 2024, 1, Some(100.0)),
            obs("SP", 2024, 2, Some(300.0)),
            obs("RJ", 2024, 1, Some(0.0)),
        ];
        data[0].converted = Some(10.0);
        data[1].converted = Some(30.0);
        data[2].converted = Some(5.0);
        let rows = conversion_rates(&data);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].region, "SP");
        assert_eq!(rows[0].rate, Some(0.1));
        assert_eq!(rows[1].rate, None);
    }
}
