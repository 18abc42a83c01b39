use crate::error::Result;
use crate::forecast::{monthly_series, ForecastBatch};
use crate::locale::{format_br_number, month_label};
use crate::types::{
    ChartPoint, ConversionRow, ConversionTableRow, Observation, ProjectionExportRow, RankingRow,
    SeriesKind,
};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// History (no bounds) then forecast points, region by region.
pub fn chart_series(
    observations: &[Observation],
    batch: &ForecastBatch,
    regions: &[String],
) -> Vec<ChartPoint> {
    let mut out = Vec::new();
    for region in regions {
        for (month, value) in monthly_series(observations, region) {
            out.push(ChartPoint {
                region: region.clone(),
                month,
                kind: SeriesKind::Historical,
                value,
                lower: None,
                upper: None,
            });
        }
        for p in batch.get(region).unwrap_or(&[]) {
            out.push(ChartPoint {
                region: region.clone(),
                month: p.month,
                kind: SeriesKind::Forecast,
                value: p.estimate,
                lower: Some(p.lower),
                upper: Some(p.upper),
            });
        }
    }
    out
}

pub fn projection_export(batch: &ForecastBatch) -> Vec<ProjectionExportRow> {
    batch
        .forecasts
        .iter()
        .flat_map(|f| {
            f.points.iter().map(move |p| ProjectionExportRow {
                region: f.region.clone(),
                month_label: month_label(p.month),
                estimate: format_br_number(p.estimate, 0),
                lower: format_br_number(p.lower, 0),
                upper: format_br_number(p.upper, 0),
            })
        })
        .collect()
}

pub fn conversion_table(rows: &[ConversionRow]) -> Vec<ConversionTableRow> {
    rows.iter()
        .map(|r| ConversionTableRow {
            region: r.region.clone(),
            year: r.year,
            attempts: format_br_number(r.attempts, 0),
            converted: format_br_number(r.converted, 0),
            rate: r
                .rate
                .map(|v| format!("{}%", format_br_number(v * 100.0, 2)))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

/// Header of the ranking table. Columns depend on the configured years and
/// comparisons, so the table is built row by row.
pub fn ranking_header(rows: &[RankingRow]) -> Vec<String> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mut header = vec!["UF".to_string()];
    header.extend(first.totals.iter().map(|(y, _)| format!("{} (Executado)", y)));
    header.push(format!("{} Realizado", first.target_year));
    header.push(format!("{} Projetado", first.target_year));
    header.push(format!("{} (Realizado + Projetado)", first.target_year));
    header.extend(first.deltas.iter().map(|d| d.label.clone()));
    header.push("Chave".to_string());
    header
}

pub fn ranking_records(rows: &[RankingRow], fmt: impl Fn(f64) -> String) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| {
            let mut rec = vec![r.region.clone()];
            rec.extend(r.totals.iter().map(|(_, v)| fmt(*v)));
            rec.push(fmt(r.realized));
            rec.push(fmt(r.projected));
            rec.push(fmt(r.combined));
            rec.extend(r.deltas.iter().map(|d| fmt(d.value)));
            rec.push(fmt(r.sort_key));
            rec
        })
        .collect()
}

pub fn write_ranking_csv(path: &Path, rows: &[RankingRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(ranking_header(rows))?;
    for rec in ranking_records(rows, |v| format!("{:.2}", v)) {
        wtr.write_record(rec)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn preview_ranking(rows: &[RankingRow], max_rows: usize) {
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(ranking_header(rows));
    for rec in ranking_records(&rows[..rows.len().min(max_rows)], |v| format_br_number(v, 0)) {
        builder.push_record(rec);
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
