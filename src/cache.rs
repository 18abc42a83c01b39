// Memoized forecasts.
//
// Fitting a region is the expensive step, so results are kept per
// (region, history fingerprint, horizon, holiday set) and reused until the
// entry is older than the TTL. Only the single-threaded request loop touches
// the cache, so it is a plain map.
use crate::error::ForecastError;
use crate::forecast::HolidayWindow;
use crate::types::ForecastPoint;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastKey {
    pub region: String,
    pub fingerprint: String,
    pub horizon: usize,
    pub holiday_version: String,
}

#[derive(Debug, Clone)]
struct CachedForecast {
    points: Vec<ForecastPoint>,
    computed_at: DateTime<Utc>,
}

/// SHA-256 over the (month, value) pairs of a series.
pub fn fingerprint_series(series: &[(NaiveDate, f64)]) -> String {
    let mut hasher = Sha256::new();
    for (month, value) in series {
        hasher.update(month.to_string().as_bytes());
        hasher.update(value.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// SHA-256 over a holiday set; identical sets give identical versions.
pub fn holiday_version(holidays: &[HolidayWindow]) -> String {
    let mut hasher = Sha256::new();
    for h in holidays {
        hasher.update(format!(
            "{}|{}|{}|{};",
            h.name, h.date, h.lower_window, h.upper_window
        ));
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct ForecastCache {
    ttl: Duration,
    entries: HashMap<ForecastKey, CachedForecast>,
}

impl ForecastCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    fn is_fresh(&self, entry: &CachedForecast, now: DateTime<Utc>) -> bool {
        now - entry.computed_at < self.ttl
    }

    pub fn get(&self, key: &ForecastKey, now: DateTime<Utc>) -> Option<&[ForecastPoint]> {
        self.entries
            .get(key)
            .filter(|e| self.is_fresh(e, now))
            .map(|e| e.points.as_slice())
    }

    pub fn insert(&mut self, key: ForecastKey, points: Vec<ForecastPoint>, now: DateTime<Utc>) {
        self.entries.insert(key, CachedForecast { points, computed_at: now });
    }

    /// Return the cached forecast for `key`, or compute and store it.
    /// Errors from `compute` are returned and not cached.
    pub fn get_or_try_insert_with<F>(
        &mut self,
        key: ForecastKey,
        now: DateTime<Utc>,
        compute: F,
    ) -> Result<Vec<ForecastPoint>, ForecastError>
    where
        F: FnOnce() -> Result<Vec<ForecastPoint>, ForecastError>,
    {
        if let Some(points) = self.get(&key, now) {
            tracing::debug!(region = %key.region, "Forecast cache hit");
            return Ok(points.to_vec());
        }
        let points = compute()?;
        self.insert(key, points.clone(), now);
        Ok(points)
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| now - e.computed_at < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn key(region: &str, horizon: usize) -> ForecastKey {
        ForecastKey {
            region: region.to_string(),
            fingerprint: fingerprint_series(&[(ym(2024, 1), 10.0)]),
            horizon,
            holiday_version: holiday_version(&[]),
        }
    }

    fn points(v: f64) -> Vec<ForecastPoint> {
        vec![ForecastPoint { month: ym(2024, 2), estimate: v, lower: v, upper: v }]
    }

    #[test]
    fn fingerprint_changes_with_data() {
        let a = fingerprint_series(&[(ym(2024, 1), 10.0), (ym(2024, 2), 11.0)]);
        let b = fingerprint_series(&[(ym(2024, 1), 10.0), (ym(2024, 2), 12.0)]);
        assert_ne!(a, b);
        assert_eq!(a, fingerprint_series(&[(ym(2024, 1), 10.0), (ym(2024, 2), 11.0)]));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = ForecastCache::new(Duration::minutes(30));
        cache.insert(key("SP", 12), points(1.0), at(0));
        assert!(cache.get(&key("SP", 12), at(29)).is_some());
        assert!(cache.get(&key("SP", 12), at(30)).is_none());
        assert_eq!(cache.purge_expired(at(31)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn key_includes_horizon() {
        let mut cache = ForecastCache::new(Duration::minutes(30));
        cache.insert(key("SP", 12), points(1.0), at(0));
        assert!(cache.get(&key("SP", 6), at(1)).is_none());
        assert!(cache.get(&key("RJ", 12), at(1)).is_none());
    }

    #[test]
    fn compute_runs_once_while_fresh() {
        let mut cache = ForecastCache::new(Duration::minutes(30));
        let mut calls = 0;
        for minute in [0, 10, 20] {
            let got = cache
                .get_or_try_insert_with(key("SP", 12), at(minute), || {
                    calls += 1;
                    Ok(points(5.0))
                })
                .unwrap();
            assert_eq!(got, points(5.0));
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache = ForecastCache::new(Duration::minutes(30));
        let err = cache.get_or_try_insert_with(key("SP", 12), at(0), || {
            Err(ForecastError::EmptySeries)
        });
        assert_eq!(err, Err(ForecastError::EmptySeries));
        assert!(cache.is_empty());
    }
}
