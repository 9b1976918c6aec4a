use crate::catalog::error::CatalogError;
use crate::types::catalog::{CatalogEntry, SeriesCode, SeriesInfo, Station};
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{debug, info, warn};
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_STATIONS_URL: &str = "https://simc.arpae.it/meteozen/rt_data/stations";
pub const DEFAULT_SERIES_URL: &str = "https://simc.arpae.it/meteozen/rt_data/archivesummary";

const STATIONS_FILE_NAME: &str = "station_infos.json";
const SERIES_FILE_NAME: &str = "series_infos.json";
const BINCODE_CACHE_FILE_NAME: &str = "catalog.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Loads the station list and the archive summary, joins them and keeps the
/// result cached in the workspace.
///
/// The raw documents are stored next to the joined cache so that a lost
/// `catalog.bin` can be rebuilt without hitting the network. Nothing is
/// fetched again unless a refresh is forced.
#[derive(Debug, Clone)]
pub struct CatalogReader {
    workspace: PathBuf,
    stations_url: String,
    series_url: String,
    client: Client,
}

impl CatalogReader {
    pub fn new(workspace: &Path) -> Self {
        Self::with_urls(workspace, DEFAULT_STATIONS_URL, DEFAULT_SERIES_URL)
    }

    pub fn with_urls(workspace: &Path, stations_url: &str, series_url: &str) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            stations_url: stations_url.to_string(),
            series_url: series_url.to_string(),
            client: Client::new(),
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.workspace.join(BINCODE_CACHE_FILE_NAME)
    }

    /// Returns the joined catalog, from cache unless `force_refresh` is set.
    pub async fn load(&self, force_refresh: bool) -> Result<Vec<CatalogEntry>, CatalogError> {
        let cache_file = self.cache_file();
        if !force_refresh && cache_file.exists() {
            let path = cache_file.clone();
            let entries =
                tokio::task::spawn_blocking(move || Self::get_cached_catalog(&path)).await??;
            debug!(
                "Loaded {} catalog entries from {}",
                entries.len(),
                cache_file.display()
            );
            return Ok(entries);
        }

        let stations_path = self.workspace.join(STATIONS_FILE_NAME);
        let series_path = self.workspace.join(SERIES_FILE_NAME);
        let stations_raw = self
            .document(&self.stations_url, &stations_path, force_refresh)
            .await?;
        let series_raw = self
            .document(&self.series_url, &series_path, force_refresh)
            .await?;

        let entries = tokio::task::spawn_blocking(move || {
            let stations: Vec<Station> = serde_json::from_slice(&stations_raw)
                .map_err(|e| CatalogError::Decode(stations_path, e))?;
            let series: Vec<SeriesInfo> = serde_json::from_slice(&series_raw)
                .map_err(|e| CatalogError::Decode(series_path, e))?;
            Ok::<_, CatalogError>(join_catalog(&stations, &series))
        })
        .await??;

        Self::cache_catalog(entries.clone(), &cache_file).await?;
        info!(
            "Catalog ready: {} series, cached to {}",
            entries.len(),
            cache_file.display()
        );
        Ok(entries)
    }

    /// Raw bytes of one catalog document: the saved copy when allowed,
    /// otherwise a fresh download which then replaces the saved copy.
    async fn document(
        &self,
        url: &str,
        path: &Path,
        force_refresh: bool,
    ) -> Result<Vec<u8>, CatalogError> {
        if !force_refresh && path.exists() {
            return tokio::fs::read(path)
                .await
                .map_err(|e| CatalogError::CacheRead(path.to_path_buf(), e));
        }
        let bytes = self.fetch(url).await?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| CatalogError::CacheWrite(path.to_path_buf(), e))?;
        Ok(bytes)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        info!("Fetching catalog document from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    CatalogError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    CatalogError::NetworkRequest(url.to_string(), e)
                });
            }
        };
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatalogError::NetworkRequest(url.to_string(), e))?;
        Ok(bytes.to_vec())
    }

    fn get_cached_catalog(cache_path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| CatalogError::CacheRead(cache_path.to_path_buf(), e))?;
        let (entries, _) =
            bincode::serde::decode_from_slice::<Vec<CatalogEntry>, _>(&bytes, BINCODE_CONFIG)
                .map_err(|e| CatalogError::CacheDecode(cache_path.to_path_buf(), Box::new(e)))?;
        Ok(entries)
    }

    async fn cache_catalog(
        entries: Vec<CatalogEntry>,
        cache_path: &Path,
    ) -> Result<(), CatalogError> {
        let data = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(entries, BINCODE_CONFIG)
                .map_err(|e| CatalogError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(cache_path, &data)
            .await
            .map_err(|e| CatalogError::CacheWrite(cache_path.to_path_buf(), e))
    }
}

/// Inner join of stations and series on the station id.
///
/// Series whose code cannot be decoded are skipped. The result is ordered by
/// station id, then series code.
pub fn join_catalog(stations: &[Station], series: &[SeriesInfo]) -> Vec<CatalogEntry> {
    let by_id: HashMap<&str, &Station> = stations.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut entries: Vec<CatalogEntry> = series
        .iter()
        .filter_map(|info| {
            let station = by_id.get(info.station.as_str())?;
            match info.variable.parse::<SeriesCode>() {
                Ok(code) => Some(CatalogEntry::join(station, info, code)),
                Err(e) => {
                    debug!("Skipping series of station {}: {}", info.station, e);
                    None
                }
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        a.station_id
            .cmp(&b.station_id)
            .then_with(|| a.variable.cmp(&b.variable))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const STATIONS: &str = r#"[
        {"id": "st2", "name": "Bologna urbana", "lat": 44.5, "lon": 11.3},
        {"id": "st1", "name": "Modena"},
        {"id": "st3", "name": "Orphan"}
    ]"#;

    const SERIES: &str = r#"[
        {"station": "st1", "variable": "3,0,86400/103,2000,-,-/B12101", "begin": "1990-01-01T00:00:00", "end": "2020-12-31T00:00:00"},
        {"station": "st2", "variable": "2,0,86400/103,2000,-,-/B12101", "begin": "2000-01-01T00:00:00", "end": "2010-12-31T00:00:00"},
        {"station": "st1", "variable": "garbage", "begin": "2000-01-01T00:00:00", "end": "2010-12-31T00:00:00"},
        {"station": "missing", "variable": "3,0,86400/103,2000,-,-/B12101", "begin": "2000-01-01T00:00:00", "end": "2010-12-31T00:00:00"}
    ]"#;

    #[test]
    fn join_keeps_matching_decodable_series() {
        let stations: Vec<Station> = serde_json::from_str(STATIONS).unwrap();
        let series: Vec<SeriesInfo> = serde_json::from_str(SERIES).unwrap();
        let entries = join_catalog(&stations, &series);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].station_id, "st1");
        assert_eq!(entries[0].name, "Modena");
        assert_eq!(entries[0].agg_code, 3);
        assert_eq!(entries[0].variable_code, "B12101");
        assert_eq!(entries[1].station_id, "st2");
        assert_eq!(entries[1].begin, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn fetches_once_then_serves_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let stations_mock = server
            .mock("GET", "/stations")
            .with_status(200)
            .with_body(STATIONS)
            .expect(1)
            .create_async()
            .await;
        let series_mock = server
            .mock("GET", "/archivesummary")
            .with_status(200)
            .with_body(SERIES)
            .expect(1)
            .create_async()
            .await;

        let workspace = tempfile::tempdir().unwrap();
        let reader = CatalogReader::with_urls(
            workspace.path(),
            &format!("{}/stations", server.url()),
            &format!("{}/archivesummary", server.url()),
        );

        let first = reader.load(false).await.unwrap();
        let second = reader.load(false).await.unwrap();
        assert_eq!(first, second);
        assert!(reader.cache_file().exists());
        assert!(workspace.path().join(STATIONS_FILE_NAME).exists());
        stations_mock.assert_async().await;
        series_mock.assert_async().await;
    }

    #[tokio::test]
    async fn rebuilds_from_saved_documents_without_network() {
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(workspace.path().join(STATIONS_FILE_NAME), STATIONS).unwrap();
        std::fs::write(workspace.path().join(SERIES_FILE_NAME), SERIES).unwrap();
        let reader = CatalogReader::with_urls(
            workspace.path(),
            "http://127.0.0.1:9/unreachable",
            "http://127.0.0.1:9/unreachable",
        );
        let entries = reader.load(false).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn server_error_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stations")
            .with_status(500)
            .create_async()
            .await;
        let workspace = tempfile::tempdir().unwrap();
        let reader = CatalogReader::with_urls(
            workspace.path(),
            &format!("{}/stations", server.url()),
            &format!("{}/archivesummary", server.url()),
        );
        let err = reader.load(true).await.unwrap_err();
        assert!(matches!(err, CatalogError::HttpStatus { .. }));
        assert!(!reader.cache_file().exists());
    }
}
