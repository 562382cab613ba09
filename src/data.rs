//! Returns panel loading and the rebalance calendar.
//!
//! Input layout: `index, date, asset_1 .. asset_N, benchmark` with decimal
//! daily returns (not prices). The header row is optional and detected by
//! non-numeric cells. Dates are `M/D/YYYY` strings, kept verbatim for report
//! naming and parsed with chrono only to build the month-start calendar.

use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};

use crate::error::{EngineError, Result};

/// Immutable panel of daily asset returns plus the aligned benchmark series.
#[derive(Debug, Clone)]
pub struct ReturnsPanel {
    pub dates: Vec<String>,
    pub assets: Vec<String>,
    /// T x N matrix of arithmetic daily returns.
    pub returns: Array2<f64>,
    /// Length-T benchmark return series.
    pub benchmark: Array1<f64>,
}

impl ReturnsPanel {
    pub fn n_days(&self) -> usize {
        self.returns.nrows()
    }

    pub fn n_assets(&self) -> usize {
        self.returns.ncols()
    }

    /// E[t,a] = R[t,a] - b[t].
    pub fn excess_returns(&self) -> Array2<f64> {
        let mut excess = self.returns.clone();
        for (t, mut row) in excess.rows_mut().into_iter().enumerate() {
            row -= self.benchmark[t];
        }
        excess
    }

    /// First trading day of each month, in input order. A date is emitted
    /// whenever its (year, month) differs from the previous row's; the first
    /// row is always included.
    pub fn rebalance_calendar(&self) -> Result<Vec<String>> {
        let mut calendar = Vec::new();
        let mut prev: Option<(i32, u32)> = None;
        for date in &self.dates {
            let parsed = parse_date(date)?;
            let key = (parsed.year(), parsed.month());
            if prev != Some(key) {
                calendar.push(date.clone());
                prev = Some(key);
            }
        }
        Ok(calendar)
    }
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%m/%d/%Y")
        .map_err(|e| EngineError::Input(format!("bad date '{date}': {e}")))
}

/// Reads the panel CSV. Column 0 is a row index, column 1 the date, the last
/// column the benchmark and everything between an asset return.
pub fn load_panel(path: &str) -> Result<ReturnsPanel> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_path(path)?;

    let mut dates = Vec::new();
    let mut cells: Vec<f64> = Vec::new();
    let mut bench = Vec::new();
    let mut assets: Vec<String> = Vec::new();
    let mut n_assets = 0usize;

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() < 4 {
            return Err(EngineError::Input(format!(
                "row {row}: expected at least 4 columns (index, date, assets, benchmark), got {}",
                record.len()
            )));
        }
        let width = record.len() - 3;
        if n_assets == 0 {
            n_assets = width;
        } else if width != n_assets {
            return Err(EngineError::Input(format!(
                "row {row}: expected {n_assets} asset columns, got {width}"
            )));
        }

        // Header row: the benchmark cell does not parse as a number.
        let last = record.len() - 1;
        if row == 0 && record[last].trim().parse::<f64>().is_err() {
            assets = (2..last).map(|i| record[i].trim().to_string()).collect();
            continue;
        }

        dates.push(record[1].trim().to_string());
        for col in 2..last {
            let cell = record[col].trim();
            let value: f64 = cell.parse().map_err(|_| {
                EngineError::Input(format!("row {row}, column {col}: non-numeric cell '{cell}'"))
            })?;
            cells.push(value);
        }
        let bench_cell = record[last].trim();
        bench.push(bench_cell.parse::<f64>().map_err(|_| {
            EngineError::Input(format!(
                "row {row}, column {last}: non-numeric benchmark cell '{bench_cell}'"
            ))
        })?);
    }

    if dates.is_empty() {
        return Err(EngineError::Input("no data rows in input file".to_string()));
    }
    if assets.is_empty() {
        assets = (1..=n_assets).map(|i| format!("asset_{i}")).collect();
    }

    let returns = Array2::from_shape_vec((dates.len(), n_assets), cells)
        .map_err(|e| EngineError::Input(format!("panel shape: {e}")))?;

    Ok(ReturnsPanel {
        dates,
        assets,
        returns,
        benchmark: Array1::from_vec(bench),
    })
}

/// Asset index -> sector name. The input CSV carries no sector metadata, so
/// callers supply the mapping; the CLI uses [`SectorMap::rotation`].
#[derive(Debug, Clone)]
pub struct SectorMap {
    sectors: Vec<String>,
}

impl SectorMap {
    pub fn new(sectors: Vec<String>) -> Self {
        Self { sectors }
    }

    /// Assigns sectors round-robin from `names` across `n` assets.
    pub fn rotation(n: usize, names: &[&str]) -> Self {
        let sectors = (0..n).map(|i| names[i % names.len()].to_string()).collect();
        Self { sectors }
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    /// Sector of asset `i`, or an invalid-sector-map error.
    pub fn sector_of(&self, i: usize) -> Result<&str> {
        self.sectors.get(i).map(String::as_str).ok_or_else(|| {
            EngineError::Input(format!("invalid sector map: asset {i} has no sector"))
        })
    }

    /// Distinct sector names in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for s in &self.sectors {
            if !seen.contains(&s.as_str()) {
                seen.push(s.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(tag: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("portopt_panel_{tag}_{}.csv", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_panel_with_header() {
        let path = write_temp(
            "header",
            "idx,date,AAA,BBB,bench\n\
             0,1/2/2020,0.01,-0.02,0.005\n\
             1,1/3/2020,0.02,0.01,0.0\n",
        );
        let panel = load_panel(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(panel.n_days(), 2);
        assert_eq!(panel.n_assets(), 2);
        assert_eq!(panel.assets, vec!["AAA", "BBB"]);
        assert_eq!(panel.dates[0], "1/2/2020");
        assert!((panel.returns[[0, 1]] + 0.02).abs() < 1e-15);
        assert!((panel.benchmark[1]).abs() < 1e-15);
    }

    #[test]
    fn non_numeric_cell_is_input_error() {
        let path = write_temp("badcell", "0,1/2/2020,0.01,oops,0.005\n");
        let err = load_panel(path.to_str().unwrap()).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, EngineError::Input(_)));
    }

    #[test]
    fn excess_identity_holds() {
        let panel = ReturnsPanel {
            dates: vec!["1/2/2020".into(), "1/3/2020".into()],
            assets: vec!["A".into(), "B".into()],
            returns: ndarray::array![[0.01, -0.02], [0.02, 0.01]],
            benchmark: ndarray::array![0.005, -0.001],
        };
        let excess = panel.excess_returns();
        for t in 0..panel.n_days() {
            for a in 0..panel.n_assets() {
                let recomposed = excess[[t, a]] + panel.benchmark[t];
                assert!((recomposed - panel.returns[[t, a]]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn calendar_emits_month_starts() {
        let panel = ReturnsPanel {
            dates: vec![
                "1/2/2020".into(),
                "1/3/2020".into(),
                "2/3/2020".into(),
                "2/4/2020".into(),
                "3/2/2020".into(),
            ],
            assets: vec!["A".into()],
            returns: Array2::zeros((5, 1)),
            benchmark: Array1::zeros(5),
        };
        let cal = panel.rebalance_calendar().unwrap();
        assert_eq!(cal, vec!["1/2/2020", "2/3/2020", "3/2/2020"]);
    }

    #[test]
    fn bad_date_fails_calendar() {
        let panel = ReturnsPanel {
            dates: vec!["2020-01-02".into()],
            assets: vec!["A".into()],
            returns: Array2::zeros((1, 1)),
            benchmark: Array1::zeros(1),
        };
        assert!(panel.rebalance_calendar().is_err());
    }

    #[test]
    fn sector_rotation_covers_all_assets() {
        let map = SectorMap::rotation(5, &["Tech", "Fin"]);
        assert_eq!(map.sector_of(0).unwrap(), "Tech");
        assert_eq!(map.sector_of(3).unwrap(), "Fin");
        assert_eq!(map.names(), vec!["Tech", "Fin"]);
        assert!(map.sector_of(7).is_err());
    }
}
