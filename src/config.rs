// Run settings, loaded from an optional JSON file.
use crate::error::{DashboardError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MAX_HORIZON_MONTHS: usize = 24;

/// Which ranking view to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingView {
    /// Signed `target - baseline`, largest growth first.
    Growth,
    /// `max(0, baseline - target)`, largest loss first.
    Decline,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_path: PathBuf,
    pub delimiter: char,
    /// Regions to keep; empty means every region in the feed.
    pub regions: Vec<String>,
    /// Inclusive date filter on the observation month.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub horizon_months: usize,
    pub target_year: i32,
    pub baseline_years: Vec<i32>,
    pub view: RankingView,
    pub exclude_insufficient: bool,
    pub include_holidays: bool,
    pub cache_ttl_minutes: i64,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let year = Utc::now().year();
        Settings {
            input_path: PathBuf::from("tentativas_reserva.csv"),
            delimiter: ',',
            regions: Vec::new(),
            start: None,
            end: None,
            horizon_months: 12,
            target_year: year,
            baseline_years: vec![year - 2, year - 1],
            view: RankingView::Growth,
            exclude_insufficient: false,
            include_holidays: true,
            cache_ttl_minutes: 60,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing path or file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let settings = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                let s: Settings = serde_json::from_str(&raw)?;
                tracing::info!(path = %p.display(), "Loaded settings");
                s
            }
            Some(p) => {
                tracing::info!(path = %p.display(), "Settings file not found, using defaults");
                Settings::default()
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HORIZON_MONTHS).contains(&self.horizon_months) {
            return Err(DashboardError::Config(format!(
                "horizon_months must be between 1 and {} (got {})",
                MAX_HORIZON_MONTHS, self.horizon_months
            )));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(DashboardError::Config(format!(
                    "start {} is after end {}",
                    start, end
                )));
            }
        }
        if self.baseline_years.is_empty() {
            return Err(DashboardError::Config("baseline_years must not be empty".into()));
        }
        if self.cache_ttl_minutes <= 0 {
            return Err(DashboardError::Config("cache_ttl_minutes must be positive".into()));
        }
        if !self.delimiter.is_ascii() {
            return Err(DashboardError::Config(format!(
                "delimiter must be a single ASCII character (got {:?})",
                self.delimiter
            )));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.horizon_months, 12);
        assert_eq!(s.baseline_years, vec![s.target_year - 2, s.target_year - 1]);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"regions": ["SP", "RJ"], "horizon_months": 6, "view": "decline", "start": "2023-01-01"}}"#
        )
        .unwrap();
        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.regions, vec!["SP", "RJ"]);
        assert_eq!(s.horizon_months, 6);
        assert_eq!(s.view, RankingView::Decline);
        assert_eq!(s.start, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(s.delimiter, ',');
    }

    #[test]
    fn missing_file_uses_defaults() {
        let s = Settings::load(Some(Path::new("/nonexistent/settings.json"))).unwrap();
        assert_eq!(s.horizon_months, 12);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(DashboardError::Json { .. })
        ));
    }

    #[test]
    fn horizon_is_bounded() {
        for h in [0, 25] {
            let s = Settings { horizon_months: h, ..Settings::default() };
            assert!(matches!(s.validate(), Err(DashboardError::Config(_))));
        }
        let s = Settings { horizon_months: 24, ..Settings::default() };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let s = Settings {
            start: NaiveDate::from_ymd_opt(2025, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
