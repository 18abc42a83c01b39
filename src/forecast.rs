// Per-region forecasting.
//
// The model sits behind `Forecaster`: given a monthly history and optional
// holiday windows it returns one point per future month after the last
// observed one. `SeasonalNaive` is the built-in deterministic model.
// `forecast_regions` runs a batch through the `ForecastCache`, skipping
// regions whose fit fails instead of aborting.
use crate::cache::{fingerprint_series, holiday_version, ForecastCache, ForecastKey};
use crate::error::ForecastError;
use crate::locale::truncate_to_month;
use crate::types::{ForecastPoint, Observation, ProjectionEstimate};
use crate::util::{average, std_dev};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;

/// A named calendar interval: `date` minus `lower_window` days through
/// `date` plus `upper_window` days.
#[derive(Debug, Clone, PartialEq)]
pub struct HolidayWindow {
    pub name: String,
    pub date: NaiveDate,
    pub lower_window: i64,
    pub upper_window: i64,
}

impl HolidayWindow {
    pub fn new(name: &str, date: NaiveDate, lower_window: i64, upper_window: i64) -> Self {
        Self { name: name.to_string(), date, lower_window, upper_window }
    }

    /// First-of-month dates of every month the window touches.
    pub fn months(&self) -> Vec<NaiveDate> {
        let start = self
            .date
            .checked_sub_signed(Duration::days(self.lower_window))
            .unwrap_or(NaiveDate::MIN);
        let end = self
            .date
            .checked_add_signed(Duration::days(self.upper_window))
            .unwrap_or(NaiveDate::MAX);
        let last = truncate_to_month(end);
        let mut out = Vec::new();
        let mut m = truncate_to_month(start);
        while m <= last {
            out.push(m);
            match shift_months(m, 1) {
                Some(next) => m = next,
                None => break,
            }
        }
        out
    }
}

pub trait Forecaster {
    fn name(&self) -> &str;

    /// `history` is sorted by month with at most one entry per month; gaps are
    /// allowed. Returns exactly `horizon` points, starting the month after the
    /// last one in `history`.
    fn forecast(
        &self,
        history: &[(NaiveDate, f64)],
        horizon: usize,
        holidays: &[HolidayWindow],
    ) -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Same month last year plus the mean year-over-year change.
///
/// Months with no value twelve months back use the trailing twelve-month
/// mean instead. Holidays that move between months (Carnaval, Easter) shift
/// their average lift with them. Bounds are `z` times the spread of
/// year-over-year residuals, widened with the square root of the number of
/// years ahead. Counts never go below zero.
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    pub z: f64,
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        // 95% interval
        Self { z: 1.96 }
    }
}

impl Forecaster for SeasonalNaive {
    fn name(&self) -> &str {
        "seasonal-naive"
    }

    fn forecast(
        &self,
        history: &[(NaiveDate, f64)],
        horizon: usize,
        holidays: &[HolidayWindow],
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::InvalidHorizon(horizon));
        }
        if history.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        if let Some((m, _)) = history.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ForecastError::Model(format!("non-finite value at {}", m)));
        }

        let mut values: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (m, v) in history {
            *values.entry(truncate_to_month(*m)).or_insert(0.0) += v;
        }
        let last = match values.keys().next_back() {
            Some(m) => *m,
            None => return Err(ForecastError::EmptySeries),
        };

        let yoy: Vec<f64> = values
            .iter()
            .filter_map(|(m, v)| {
                shift_months(*m, -12)
                    .and_then(|p| values.get(&p))
                    .map(|prev| v - prev)
            })
            .collect();
        let drift = average(&yoy);
        let residuals: Vec<f64> = yoy.iter().map(|d| d - drift).collect();
        let recent: Vec<f64> = values.values().rev().take(12).copied().collect();
        let level = average(&recent);
        let sigma = if residuals.len() >= 2 { std_dev(&residuals) } else { std_dev(&recent) };

        let calendar = holiday_calendar(holidays);
        let lifts = holiday_lifts(&values, &calendar);

        let mut points = Vec::with_capacity(horizon);
        for step in 1..=horizon {
            let month = shift_months(last, step as i32).ok_or_else(|| {
                ForecastError::Model(format!("month {} steps after {} is out of range", step, last))
            })?;
            let reference = shift_months(month, -12);
            let base = match reference.and_then(|r| values.get(&r).map(|prev| (r, *prev))) {
                Some((r, prev)) => prev + drift + holiday_shift(month, r, &calendar, &lifts),
                None => level,
            };
            let estimate = base.max(0.0);
            let years_ahead = ((step + 11) / 12) as f64;
            let half_width = self.z * sigma * years_ahead.sqrt();
            points.push(ForecastPoint {
                month,
                estimate,
                lower: (estimate - half_width).max(0.0),
                upper: estimate + half_width,
            });
            // Later steps reference this month a year on.
            values.insert(month, estimate);
        }
        Ok(points)
    }
}

/// First of the month `n` months away from `d`'s month; `None` outside the
/// representable date range.
pub fn shift_months(d: NaiveDate, n: i32) -> Option<NaiveDate> {
    let total = (d.year() as i64) * 12 + d.month0() as i64 + n as i64;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    NaiveDate::from_ymd_opt(year, total.rem_euclid(12) as u32 + 1, 1)
}

fn holiday_calendar(holidays: &[HolidayWindow]) -> HashMap<NaiveDate, HashSet<&str>> {
    let mut calendar: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
    for h in holidays {
        for m in h.months() {
            calendar.entry(m).or_default().insert(h.name.as_str());
        }
    }
    calendar
}

/// Mean value of months containing a holiday minus the mean of all months.
fn holiday_lifts<'a>(
    values: &BTreeMap<NaiveDate, f64>,
    calendar: &HashMap<NaiveDate, HashSet<&'a str>>,
) -> HashMap<&'a str, f64> {
    let overall = average(&values.values().copied().collect::<Vec<_>>());
    let mut samples: HashMap<&str, Vec<f64>> = HashMap::new();
    for (m, v) in values {
        if let Some(names) = calendar.get(m) {
            for name in names {
                samples.entry(*name).or_default().push(*v);
            }
        }
    }
    samples
        .into_iter()
        .map(|(name, vs)| (name, average(&vs) - overall))
        .collect()
}

/// Lift gained by holidays present in `month` but not in `reference`, minus
/// lift lost by holidays only in `reference`.
fn holiday_shift(
    month: NaiveDate,
    reference: NaiveDate,
    calendar: &HashMap<NaiveDate, HashSet<&str>>,
    lifts: &HashMap<&str, f64>,
) -> f64 {
    let empty = HashSet::new();
    let now = calendar.get(&month).unwrap_or(&empty);
    let then = calendar.get(&reference).unwrap_or(&empty);
    let lift = |name: &&str| lifts.get(*name).copied().unwrap_or(0.0);
    now.difference(then).map(lift).sum::<f64>() - then.difference(now).map(lift).sum::<f64>()
}

/// Sum duplicate months of one region, dropping unparseable values.
pub fn monthly_series(observations: &[Observation], region: &str) -> Vec<(NaiveDate, f64)> {
    let mut series: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for o in observations.iter().filter(|o| o.region == region) {
        if let Some(v) = o.value {
            *series.entry(o.month).or_insert(0.0) += v;
        }
    }
    series.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionForecast {
    pub region: String,
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRegion {
    pub region: String,
    pub error: ForecastError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastBatch {
    pub forecasts: Vec<RegionForecast>,
    pub skipped: Vec<SkippedRegion>,
}

impl ForecastBatch {
    pub fn get(&self, region: &str) -> Option<&[ForecastPoint]> {
        self.forecasts
            .iter()
            .find(|f| f.region == region)
            .map(|f| f.points.as_slice())
    }
}

/// Forecast each region in turn. A region whose fit fails is logged and
/// listed in `skipped`; its history is untouched and the batch continues.
pub fn forecast_regions(
    forecaster: &dyn Forecaster,
    cache: &mut ForecastCache,
    observations: &[Observation],
    regions: &[String],
    horizon: usize,
    holidays: &[HolidayWindow],
    now: DateTime<Utc>,
) -> ForecastBatch {
    let holiday_set = holiday_version(holidays);
    let mut batch = ForecastBatch::default();

    for region in regions {
        let series = monthly_series(observations, region);
        let key = ForecastKey {
            region: region.clone(),
            fingerprint: fingerprint_series(&series),
            horizon,
            holiday_version: holiday_set.clone(),
        };
        match cache.get_or_try_insert_with(key, now, || {
            forecaster.forecast(&series, horizon, holidays)
        }) {
            Ok(points) => batch.forecasts.push(RegionForecast { region: region.clone(), points }),
            Err(error) => {
                tracing::warn!(region = %region, model = forecaster.name(), error = %error, "Forecast failed, skipping region");
                batch.skipped.push(SkippedRegion { region: region.clone(), error });
            }
        }
    }

    tracing::info!(
        forecasted = batch.forecasts.len(),
        skipped = batch.skipped.len(),
        horizon,
        "Forecast batch finished"
    );
    batch
}

/// Per-region sum of point estimates whose month falls in `year`.
pub fn projection_estimates(batch: &ForecastBatch, year: i32) -> Vec<ProjectionEstimate> {
    batch
        .forecasts
        .iter()
        .map(|f| ProjectionEstimate {
            region: f.region.clone(),
            year,
            total: f
                .points
                .iter()
                .filter(|p| p.month.year() == year)
                .map(|p| p.estimate)
                .sum(),
        })
        .collect()
}

/// [`projection_estimates`] keyed by region, as consumed by the ranking.
pub fn projection_totals(batch: &ForecastBatch, year: i32) -> HashMap<String, f64> {
    projection_estimates(batch, year)
        .into_iter()
        .map(|p| (p.region, p.total))
        .collect()
}

/// Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// National holidays and school vacation windows for the given years.
pub fn brazilian_holidays(years: RangeInclusive<i32>) -> Vec<HolidayWindow> {
    const FIXED: [(&str, u32, u32); 8] = [
        ("confraternizacao_universal", 1, 1),
        ("tiradentes", 4, 21),
        ("dia_do_trabalho", 5, 1),
        ("independencia", 9, 7),
        ("nossa_senhora_aparecida", 10, 12),
        ("finados", 11, 2),
        ("proclamacao_da_republica", 11, 15),
        ("natal", 12, 25),
    ];

    let mut out = Vec::new();
    for year in years {
        for (name, month, day) in FIXED {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                out.push(HolidayWindow::new(name, date, 0, 0));
            }
        }
        if let Some(easter) = easter_sunday(year) {
            // Carnaval Tuesday, with the weekend and Monday before it.
            out.push(HolidayWindow::new("carnaval", easter - Duration::days(47), 3, 1));
            out.push(HolidayWindow::new("sexta_feira_santa", easter - Duration::days(2), 0, 0));
            out.push(HolidayWindow::new("corpus_christi", easter + Duration::days(60), 0, 0));
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, 7, 1) {
            out.push(HolidayWindow::new("ferias_julho", date, 0, 30));
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, 12, 20) {
            out.push(HolidayWindow::new("ferias_verao", date, 0, 45));
        }
    }
    out
}
