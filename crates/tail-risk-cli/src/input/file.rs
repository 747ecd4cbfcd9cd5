use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tail_risk_core::{ReturnMatrix, ReturnSeries, RiskConfig, WeightVector};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Read a JSON file and deserialise into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &str) -> CliResult<T> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(value)
}

/// Read a run configuration. `.yaml`/`.yml` files go through serde_yaml,
/// anything else is parsed as JSON. Missing fields take their defaults.
pub fn read_config(path: &str) -> CliResult<RiskConfig> {
    let canonical = resolve_path(path)?;
    let is_yaml = matches!(
        canonical.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if !is_yaml {
        return read_json(path);
    }
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let config: RiskConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(config)
}

/// Weights as a JSON object of asset id to weight.
pub fn read_weights(path: &str) -> CliResult<WeightVector> {
    read_json(path)
}

/// Read a return matrix from a CSV file.
pub fn read_returns_csv(path: &str) -> CliResult<ReturnMatrix> {
    let canonical = resolve_path(path)?;
    let file = fs::File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_returns_csv(file, &canonical.display().to_string())
}

/// Parse a return matrix: the first column holds ISO dates, the header row
/// holds asset ids. Empty, `NA` and `NaN` cells are missing observations.
/// Rows are sorted by date.
pub fn parse_returns_csv<R: Read>(reader: R, source: &str) -> CliResult<ReturnMatrix> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| format!("Failed to read header of '{source}': {e}"))?
        .clone();
    let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if assets.is_empty() {
        return Err(format!("'{source}' needs a date column and at least one asset column").into());
    }

    let mut records: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| format!("'{source}' row {}: {e}", line + 2))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| format!("'{source}' row {}: bad date '{raw_date}': {e}", line + 2))?;
        let values = record
            .iter()
            .skip(1)
            .map(|cell| parse_cell(cell).map_err(|e| format!("'{source}' {date}: {e}")))
            .collect::<Result<Vec<f64>, String>>()?;
        records.push((date, values));
    }
    records.sort_by_key(|(date, _)| *date);

    let (dates, rows) = records.into_iter().unzip();
    Ok(ReturnMatrix::new(dates, assets, rows)?)
}

fn parse_cell(cell: &str) -> Result<f64, String> {
    match cell {
        "" | "NA" | "NaN" | "nan" => Ok(f64::NAN),
        s => s
            .parse::<f64>()
            .map_err(|e| format!("bad return '{s}': {e}")),
    }
}

/// Collapse a single-column matrix into a series.
pub fn single_series(matrix: ReturnMatrix) -> CliResult<ReturnSeries> {
    if matrix.n_assets() != 1 {
        return Err(format!(
            "Expected one return column, found {} ({})",
            matrix.n_assets(),
            matrix.assets.join(", ")
        )
        .into());
    }
    let values = matrix.rows.into_iter().map(|row| row[0]).collect();
    Ok(ReturnSeries::new(matrix.dates, values)?)
}

/// Resolve and validate the path.
fn resolve_path(path: &str) -> CliResult<PathBuf> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
