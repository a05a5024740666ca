//! Data loader: fetch the station CSV, check its columns and project it to observations.

use crate::dataset::{Observation, Snapshot, DATE, NAME, PRCP, REQUIRED_COLUMNS};
use crate::error::{PipelineError, PipelineResult};
use chrono::NaiveDate;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Full daily-summary files are large; give the download room.
const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Where the raw table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

impl SourceLocation {
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Remote(location.to_string())
        } else {
            Self::Local(PathBuf::from(location.strip_prefix("file://").unwrap_or(location)))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetch and parse the table at `location`. Fetch failures propagate unchanged.
pub fn load(location: &str) -> PipelineResult<Snapshot> {
    let location = SourceLocation::parse(location);
    info!(source = %location, "Loading raw dataset");

    let snapshot = match &location {
        SourceLocation::Remote(url) => {
            let client = reqwest::blocking::Client::builder().timeout(FETCH_TIMEOUT).build()?;
            let response = client.get(url).send()?.error_for_status()?;
            read_snapshot(response)?
        }
        SourceLocation::Local(path) => read_snapshot(BufReader::new(File::open(path)?))?,
    };

    info!(source = %location, rows = snapshot.len(), "Loaded raw dataset");
    Ok(snapshot)
}

/// Parse CSV text with at least the `DATE`, `NAME` and `PRCP` columns.
pub fn read_snapshot<R: Read>(reader: R) -> PipelineResult<Snapshot> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);

    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let (Some(date_idx), Some(name_idx), Some(prcp_idx)) = (position(DATE), position(NAME), position(PRCP)) else {
        return Err(PipelineError::Schema {
            missing: REQUIRED_COLUMNS
                .into_iter()
                .filter(|&c| position(c).is_none())
                .map(ToString::to_string)
                .collect(),
            found: headers.iter().map(String::from).collect(),
        });
    };
    debug!(columns = headers.len(), "Source columns verified");

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        records.push(Observation {
            station_name: field(name_idx).trim().to_string(),
            date: parse_date(field(date_idx), row)?,
            precipitation: parse_precipitation(field(prcp_idx), row)?,
        });
    }

    Ok(Snapshot::new(records))
}

/// `YYYY-MM-DD`, optionally followed by a time part which is dropped.
fn parse_date(raw: &str, row: usize) -> PipelineResult<NaiveDate> {
    let day = raw.trim().split(['T', ' ']).next().unwrap_or("");
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| PipelineError::Parse { row, message: format!("invalid {DATE} value {raw:?}: {e}") })
}

/// Empty, `NA` and `NaN` cells are missing values.
fn parse_precipitation(raw: &str, row: usize) -> PipelineResult<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|e| PipelineError::Parse { row, message: format!("invalid {PRCP} value {raw:?}: {e}") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\"STATION\",\"DATE\",\"LATITUDE\",\"NAME\",\"PRCP\",\"PRCP_ATTRIBUTES\"\n\
        \"SP000008181\",\"1938-12-30\",\"41.2928\",\"BARCELONA AEROPUERTO, SP\",\"0.0\",\",,E\"\n\
        \"SP000008181\",\"1938-12-31\",\"41.2928\",\"BARCELONA AEROPUERTO, SP\",\"\",\"\"\n\
        \"SP000008181\",\"1939-01-02T00:00:00\",\"41.2928\",\"BARCELONA AEROPUERTO, SP\",\"NA\",\"\"\n";

    #[test]
    fn test_read_projects_required_columns() {
        let snapshot = read_snapshot(SAMPLE.as_bytes()).unwrap();

        assert_eq!(snapshot.len(), 3);
        let first = &snapshot.records()[0];
        assert_eq!(first.station_name, "BARCELONA AEROPUERTO, SP");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(1938, 12, 30).unwrap());
        assert_eq!(first.precipitation, Some(0.0));
        assert_eq!(snapshot.records()[2].date, NaiveDate::from_ymd_opt(1939, 1, 2).unwrap());
        assert_eq!(snapshot.precipitation()[1..].to_vec(), vec![None, None]);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let err = read_snapshot("DATE,NAME,TMAX\n1940-01-01,X,12\n".as_bytes()).unwrap_err();
        match err {
            PipelineError::Schema { missing, found } => {
                assert_eq!(missing, vec!["PRCP".to_string()]);
                assert_eq!(found, vec!["DATE", "NAME", "TMAX"]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_header_whitespace_is_trimmed() {
        let snapshot = read_snapshot(" DATE , NAME , PRCP \n1940-01-01,X,1.5\n".as_bytes()).unwrap();
        assert_eq!(snapshot.precipitation(), vec![Some(1.5)]);
    }

    #[test]
    fn test_bad_values_name_the_row() {
        let err = read_snapshot("DATE,NAME,PRCP\n1940-01-01,X,1\n1940-13-01,X,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { row: 2, .. }));

        let err = read_snapshot("DATE,NAME,PRCP\n1940-01-01,X,trace\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { row: 1, .. }));
    }

    #[test]
    fn test_location_parsing() {
        assert_eq!(
            SourceLocation::parse("https://example.org/a.csv"),
            SourceLocation::Remote("https://example.org/a.csv".to_string())
        );
        assert_eq!(SourceLocation::parse("file:///tmp/a.csv"), SourceLocation::Local(PathBuf::from("/tmp/a.csv")));
        assert_eq!(SourceLocation::parse("data/a.csv"), SourceLocation::Local(PathBuf::from("data/a.csv")));
    }

    #[test]
    fn test_load_local_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("station.csv");
        std::fs::File::create(&path).unwrap().write_all(SAMPLE.as_bytes()).unwrap();

        let snapshot = load(&format!("file://{}", path.display())).unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = load(&temp.path().join("absent.csv").display().to_string()).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_load_remote() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/access/SP000008181.csv")
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body(SAMPLE)
            .create();

        let snapshot = load(&format!("{}/access/SP000008181.csv", server.url())).unwrap();

        mock.assert();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_load_remote_failure_propagates() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.csv").with_status(404).create();

        let err = load(&format!("{}/missing.csv", server.url())).unwrap_err();
        assert!(matches!(err, PipelineError::Http(_)));
    }
}
