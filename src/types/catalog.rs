//! Data structures describing the Dext3r catalog: the station list, the
//! archive summary of available series, and the joined relation the backlog
//! builder works from.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static SERIES_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d),0,(\d+)/([^,]+),([^,]+),([^,]+),([^,]+)/(.*)")
        .expect("series code pattern is a valid regex")
});

/// A monitoring station as listed by the catalog service.
///
/// Only `id` and `name` are needed downstream; the remaining fields are kept
/// when present so the cached catalog stays useful for inspection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// Station identifier used by the data API (`station` query parameter).
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display name. The result files identify rows by this name.
    pub name: String,
    /// Latitude in decimal degrees, if reported.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude in decimal degrees, if reported.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Measurement network the station belongs to, if reported.
    #[serde(default)]
    pub network: Option<String>,
}

/// One row of the archive summary: a series available for a station.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SeriesInfo {
    /// Identifier of the station the series belongs to.
    #[serde(deserialize_with = "string_or_number")]
    pub station: String,
    /// Full series code, e.g. `3,0,86400/103,2000,-,-/B12101`.
    pub variable: String,
    /// First day with data.
    #[serde(deserialize_with = "date_prefix")]
    pub begin: NaiveDate,
    /// Last day with data.
    #[serde(deserialize_with = "date_prefix")]
    pub end: NaiveDate,
}

/// The decoded parts of a full series code
/// `<agg_code>,0,<agg_period>/<l1>,<l2>,<l3>,<l4>/<bcode>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesCode {
    pub agg_code: i32,
    /// Aggregation period in seconds.
    pub agg_period: i64,
    pub levels: [String; 4],
    /// The bare variable code (e.g. `B12101`).
    pub bcode: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesCodeParseError(pub String);

impl fmt::Display for SeriesCodeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unrecognized series code '{}'", self.0)
    }
}

impl std::error::Error for SeriesCodeParseError {}

impl FromStr for SeriesCode {
    type Err = SeriesCodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SeriesCodeParseError(s.to_string());
        let caps = SERIES_CODE_RE.captures(s).ok_or_else(err)?;
        let agg_code = caps[1].parse().map_err(|_| err())?;
        let agg_period = caps[2].parse().map_err(|_| err())?;
        Ok(SeriesCode {
            agg_code,
            agg_period,
            levels: [
                caps[3].to_string(),
                caps[4].to_string(),
                caps[5].to_string(),
                caps[6].to_string(),
            ],
            bcode: caps[7].to_string(),
        })
    }
}

/// A station joined with one of its available series.
///
/// This is the relation (station, variable, aggregation code, aggregation
/// period, availability window) the backlog builder expands into work units.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CatalogEntry {
    pub station_id: String,
    pub name: String,
    /// Full series code, sent as the `variable` parameter of the data API.
    pub variable: String,
    /// Bare variable code extracted from [`CatalogEntry::variable`].
    pub variable_code: String,
    pub agg_code: i32,
    pub agg_period: i64,
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl CatalogEntry {
    pub fn join(station: &Station, series: &SeriesInfo, code: SeriesCode) -> Self {
        Self {
            station_id: station.id.clone(),
            name: station.name.clone(),
            variable: series.variable.clone(),
            variable_code: code.bcode,
            agg_code: code.agg_code,
            agg_period: code.agg_period,
            begin: series.begin,
            end: series.end,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Str(String),
        Int(i64),
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Str(s) => s,
        Repr::Int(i) => i.to_string(),
    })
}

// Catalog timestamps come as `YYYY-MM-DDTHH:MM:SS` (sometimes with a zone
// suffix); only the calendar day matters here.
fn date_prefix<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_series_code() {
        let code: SeriesCode = "3,0,86400/103,2000,-,-/B12101".parse().unwrap();
        assert_eq!(code.agg_code, 3);
        assert_eq!(code.agg_period, 86400);
        assert_eq!(code.levels[0], "103");
        assert_eq!(code.levels[1], "2000");
        assert_eq!(code.bcode, "B12101");
    }

    #[test]
    fn rejects_malformed_series_code() {
        assert!("B12101".parse::<SeriesCode>().is_err());
        assert!("3,1,86400/103,2000,-,-/B12101".parse::<SeriesCode>().is_err());
    }

    #[test]
    fn station_id_accepts_numbers() {
        let station: Station = serde_json::from_str(r#"{"id": 1234, "name": "Bologna"}"#).unwrap();
        assert_eq!(station.id, "1234");
        assert_eq!(station.lat, None);
    }

    #[test]
    fn series_dates_keep_only_the_day() {
        let series: SeriesInfo = serde_json::from_str(
            r#"{"station": "a", "variable": "2,0,3600/103,2000,-,-/B12101",
                "begin": "1990-05-01T00:00:00", "end": "2020-12-31T23:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(series.begin, NaiveDate::from_ymd_opt(1990, 5, 1).unwrap());
        assert_eq!(series.end, NaiveDate::from_ymd_opt(2020, 12, 31).unwrap());
    }
}
