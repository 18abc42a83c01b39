// Header normalization for the reservation feed.
//
// Column names drift between exports ("UF" vs "Estado", "ds" vs "Mês", ...).
// They are resolved once against a declared alias table; nothing downstream
// looks at raw header text or column positions.
use crate::error::{DashboardError, Result};
use csv::StringRecord;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Region,
    Period,
    Attempts,
    Converted,
}

impl Column {
    pub fn canonical_name(self) -> &'static str {
        match self {
            Column::Region => "region",
            Column::Period => "period",
            Column::Attempts => "attempts",
            Column::Converted => "converted",
        }
    }
}

static ALIASES: Lazy<HashMap<&'static str, Column>> = Lazy::new(|| {
    let table: [(&[&str], Column); 4] = [
        (
            &["uf", "estado", "sg uf", "sigla uf", "region", "regiao", "unidade federativa"],
            Column::Region,
        ),
        (
            &[
                "ds",
                "data",
                "mes",
                "periodo",
                "mes ano",
                "ano mes",
                "competencia",
                "mes referencia",
                "month",
                "date",
                "period",
            ],
            Column::Period,
        ),
        (
            &[
                "y",
                "tentativas",
                "tentativas de reserva",
                "tentativas reserva",
                "qtd tentativas",
                "reservas",
                "quantidade",
                "attempts",
            ],
            Column::Attempts,
        ),
        (
            &[
                "convertidas",
                "reservas convertidas",
                "reservas efetivadas",
                "efetivadas",
                "conversoes",
                "converted",
            ],
            Column::Converted,
        ),
    ];
    table
        .iter()
        .flat_map(|(names, col)| names.iter().map(move |n| (*n, *col)))
        .collect()
});

/// Lowercase, strip Portuguese accents, treat `_`, `-` and `/` as spaces and collapse
/// runs of whitespace.
pub fn normalize_header(h: &str) -> String {
    let folded: String = h
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'ê' | 'è' => 'e',
            'í' | 'î' => 'i',
            'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ü' => 'u',
            'ç' => 'c',
            '_' | '-' | '/' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn lookup(header: &str) -> Option<Column> {
    ALIASES.get(normalize_header(header).as_str()).copied()
}

/// Positions of the canonical columns inside a header record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub region: usize,
    pub period: usize,
    pub attempts: usize,
    pub converted: Option<usize>,
}

impl ColumnMap {
    /// Resolve headers against the alias table. The first header matching a
    /// column wins. Region, period and attempts are required.
    pub fn resolve(headers: &StringRecord) -> Result<ColumnMap> {
        let mut found: HashMap<Column, usize> = HashMap::new();
        for (idx, h) in headers.iter().enumerate() {
            if let Some(col) = lookup(h) {
                found.entry(col).or_insert(idx);
            }
        }

        let require = |col: Column| {
            found.get(&col).copied().ok_or_else(|| DashboardError::MissingColumn {
                column: col.canonical_name().to_string(),
                available: headers.iter().collect::<Vec<_>>().join(", "),
            })
        };

        Ok(ColumnMap {
            region: require(Column::Region)?,
            period: require(Column::Period)?,
            attempts: require(Column::Attempts)?,
            converted: found.get(&Column::Converted).copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_accents_and_separators() {
        assert_eq!(normalize_header("  Mês_Referência "), "mes referencia");
        assert_eq!(normalize_header("Tentativas  de   Reserva"), "tentativas de reserva");
    }

    #[test]
    fn resolves_prophet_style_headers() {
        let headers = StringRecord::from(vec!["UF", "ds", "y"]);
        let map = ColumnMap::resolve(&headers).unwrap();
        assert_eq!(map, ColumnMap { region: 0, period: 1, attempts: 2, converted: None });
    }

    #[test]
    fn resolves_portuguese_headers_with_converted() {
        let headers = StringRecord::from(vec!["Mês", "Estado", "Convertidas", "Tentativas de Reserva"]);
        let map = ColumnMap::resolve(&headers).unwrap();
        assert_eq!(map.period, 0);
        assert_eq!(map.region, 1);
        assert_eq!(map.converted, Some(2));
        assert_eq!(map.attempts, 3);
    }

    #[test]
    fn first_matching_header_wins() {
        let headers = StringRecord::from(vec!["UF", "Estado", "ds", "y"]);
        assert_eq!(ColumnMap::resolve(&headers).unwrap().region, 0);
    }

    #[test]
    fn missing_region_is_fatal() {
        let headers = StringRecord::from(vec!["ds", "y"]);
        let err = ColumnMap::resolve(&headers).unwrap_err();
        match err {
            DashboardError::MissingColumn { column, available } => {
                assert_eq!(column, "region");
                assert_eq!(available, "ds, y");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
