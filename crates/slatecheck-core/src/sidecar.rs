// Reference pack loading: fetch the pipeline JSON, then try the optimizer
// sidecar it names and fall back to the embedded lineups when that fails.
//
// Fetching is the only suspending work in the crate. Every fetch is bounded
// by a timeout; nothing here touches session state, so a slow load can be
// discarded by the caller's ticket check.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::pipeline::REFERENCE_SET;
use crate::ingest::{parse_optimizer_lineups, parse_pipeline, IngestError};
use crate::model::Warning;
use crate::session::{ReferenceLoad, SidecarStatus};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        source: std::io::Error,
    },

    #[error("request for {location} failed: {source}")]
    Http {
        location: String,
        source: reqwest::Error,
    },

    #[error("timed out after {secs}s fetching {location}")]
    Timeout { location: String, secs: u64 },

    #[error("cannot resolve {relative} against {base}: {reason}")]
    InvalidLocation {
        base: String,
        relative: String,
        reason: String,
    },

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

// ---------------------------------------------------------------------------
// Fetchers
// ---------------------------------------------------------------------------

/// Retrieves the text behind a path or URL.
#[async_trait]
pub trait SidecarFetcher: Send + Sync {
    async fn fetch_text(&self, location: &str) -> Result<String, SidecarError>;
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Resolve a companion file named by a pack against the pack's own
/// location: URL join for remote packs, sibling path for local ones.
pub fn resolve_location(base: &str, relative: &str) -> Result<String, SidecarError> {
    let invalid = |reason: String| SidecarError::InvalidLocation {
        base: base.to_string(),
        relative: relative.to_string(),
        reason,
    };

    if is_url(relative) {
        return Ok(relative.to_string());
    }
    if is_url(base) {
        let url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        let joined = url.join(relative).map_err(|e| invalid(e.to_string()))?;
        return Ok(joined.to_string());
    }

    let rel = Path::new(relative);
    if rel.is_absolute() {
        return Ok(relative.to_string());
    }
    let dir = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(rel).to_string_lossy().into_owned())
}

/// Reads local files with `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct FsFetcher;

#[async_trait]
impl SidecarFetcher for FsFetcher {
    async fn fetch_text(&self, location: &str) -> Result<String, SidecarError> {
        tokio::fs::read_to_string(location)
            .await
            .map_err(|source| SidecarError::Io {
                location: location.to_string(),
                source,
            })
    }
}

/// Fetches over HTTP(S), failing on non-success status codes.
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SidecarFetcher for HttpFetcher {
    async fn fetch_text(&self, location: &str) -> Result<String, SidecarError> {
        let http_err = |source| SidecarError::Http {
            location: location.to_string(),
            source,
        };
        let response = self
            .http
            .get(location)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_err)?;
        response.text().await.map_err(http_err)
    }
}

/// Dispatches on the location: URLs over HTTP, everything else from disk.
#[derive(Debug, Default, Clone)]
pub struct DefaultFetcher {
    fs: FsFetcher,
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SidecarFetcher for DefaultFetcher {
    async fn fetch_text(&self, location: &str) -> Result<String, SidecarError> {
        if is_url(location) {
            self.http.fetch_text(location).await
        } else {
            self.fs.fetch_text(location).await
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Try the sidecar the pack names.
    pub sidecar: bool,
    pub timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            sidecar: true,
            timeout: Duration::from_secs(10),
        }
    }
}

async fn fetch_with_timeout(
    fetcher: &dyn SidecarFetcher,
    location: &str,
    timeout: Duration,
) -> Result<String, SidecarError> {
    match tokio::time::timeout(timeout, fetcher.fetch_text(location)).await {
        Ok(result) => result,
        Err(_) => Err(SidecarError::Timeout {
            location: location.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Fetch and parse the pack at `location`, then attempt its sidecar.
///
/// Only a missing or malformed pack is an error. The sidecar replaces the
/// embedded lineups when it yields at least one lineup; otherwise the
/// embedded lineups stay and the reason is recorded in the returned
/// [`SidecarStatus`].
pub async fn load_reference_pack(
    fetcher: &dyn SidecarFetcher,
    location: &str,
    options: LoadOptions,
) -> Result<ReferenceLoad, SidecarError> {
    let text = fetch_with_timeout(fetcher, location, options.timeout).await?;
    let pack = parse_pipeline(&text)?;
    let mut load = ReferenceLoad::from_pack(pack, location);

    let Some(relative) = load.pack.sidecar_path().map(str::to_string) else {
        return Ok(load);
    };
    if !options.sidecar {
        debug!("sidecar {} skipped: disabled", relative);
        return Ok(load);
    }

    let attempt = async {
        let target = resolve_location(location, &relative)?;
        let csv = fetch_with_timeout(fetcher, &target, options.timeout).await?;
        let lineups = parse_optimizer_lineups(&csv, &load.pack.players, REFERENCE_SET)?;
        Ok::<_, SidecarError>((target, lineups))
    };

    let outcome = attempt.await;
    match outcome {
        Ok((target, lineups)) if !lineups.is_empty() => {
            info!("sidecar {} loaded: {} lineups", target, lineups.len());
            load.sidecar = SidecarStatus::Loaded {
                lineups: lineups.len(),
            };
            load.lineups = lineups;
        }
        Ok((target, _)) => {
            fall_back(&mut load, &target, "no lineups in sidecar".to_string());
        }
        Err(e) => {
            fall_back(&mut load, &relative, e.to_string());
        }
    }
    Ok(load)
}

fn fall_back(load: &mut ReferenceLoad, location: &str, reason: String) {
    let warning = Warning::SidecarFetchFailed {
        location: location.to_string(),
        reason: reason.clone(),
    };
    warn!("{}", warning);
    load.sidecar = SidecarStatus::FellBack { reason };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PACK: &str = r#"{
        "players": [
            {"id": "1", "name": "A", "team": "BOS", "opp": "NYK", "pos": "PG", "salary": 6000, "proj": 30},
            {"id": "2", "name": "B", "team": "BOS", "opp": "NYK", "pos": "SG", "salary": 6000, "proj": 30},
            {"id": "3", "name": "C", "team": "BOS", "opp": "NYK", "pos": "SF", "salary": 6000, "proj": 30},
            {"id": "4", "name": "D", "team": "BOS", "opp": "NYK", "pos": "PF", "salary": 6000, "proj": 30},
            {"id": "5", "name": "E", "team": "NYK", "opp": "BOS", "pos": "C", "salary": 6000, "proj": 30},
            {"id": "6", "name": "F", "team": "NYK", "opp": "BOS", "pos": "PG", "salary": 6000, "proj": 30},
            {"id": "7", "name": "G", "team": "NYK", "opp": "BOS", "pos": "SF", "salary": 6000, "proj": 30},
            {"id": "8", "name": "H", "team": "NYK", "opp": "BOS", "pos": "C", "salary": 6000, "proj": 30}
        ],
        "lineups": [{"players": ["1","2","3","4","5","6","7","8"]}],
        "files": {"optimized_lineups": "optimized.csv"}
    }"#;

    const SIDECAR: &str = "\
PG,SG,SF,PF,C,G,F,UTIL,SimROI
1,2,3,4,5,6,7,8,12
6,2,3,4,5,1,7,8,-3
";

    /// Serves fixed text per location; everything else is not found.
    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl SidecarFetcher for MapFetcher {
        async fn fetch_text(&self, location: &str) -> Result<String, SidecarError> {
            self.0.get(location).cloned().ok_or_else(|| SidecarError::Io {
                location: location.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    /// Never answers.
    struct HangingFetcher;

    #[async_trait]
    impl SidecarFetcher for HangingFetcher {
        async fn fetch_text(&self, _location: &str) -> Result<String, SidecarError> {
            std::future::pending().await
        }
    }

    fn fetcher(entries: &[(&str, &str)]) -> MapFetcher {
        MapFetcher(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn resolves_relative_paths_and_urls() {
        assert_eq!(
            resolve_location("data/pipeline.json", "optimized.csv").unwrap(),
            Path::new("data").join("optimized.csv").to_string_lossy()
        );
        assert_eq!(
            resolve_location("https://cdn.test/packs/pipeline.json", "opt/lineups.csv").unwrap(),
            "https://cdn.test/packs/opt/lineups.csv"
        );
        assert_eq!(
            resolve_location("data/pipeline.json", "https://other.test/x.csv").unwrap(),
            "https://other.test/x.csv"
        );
    }

    #[tokio::test]
    async fn sidecar_replaces_embedded_lineups() {
        let sidecar_path = resolve_location("packs/p.json", "optimized.csv").unwrap();
        let f = fetcher(&[("packs/p.json", PACK), (sidecar_path.as_str(), SIDECAR)]);
        let load = load_reference_pack(&f, "packs/p.json", LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(load.sidecar, SidecarStatus::Loaded { lineups: 2 });
        assert_eq!(load.lineups.len(), 2);
        assert_eq!(load.lineups[0].sim_roi, Some(12.0));
        assert_eq!(load.pack.lineups.len(), 1);
    }

    #[tokio::test]
    async fn missing_sidecar_falls_back() {
        let f = fetcher(&[("p.json", PACK)]);
        let load = load_reference_pack(&f, "p.json", LoadOptions::default())
            .await
            .unwrap();
        assert!(matches!(load.sidecar, SidecarStatus::FellBack { .. }));
        assert_eq!(load.lineups.len(), 1);
        assert!(load.lineups[0].is_complete());
    }

    #[tokio::test]
    async fn empty_sidecar_falls_back() {
        let f = fetcher(&[("p.json", PACK), ("optimized.csv", "PG,SG,SF,PF,C,G,F,UTIL,SimROI\n")]);
        let load = load_reference_pack(&f, "p.json", LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(
            load.sidecar,
            SidecarStatus::FellBack {
                reason: "no lineups in sidecar".into()
            }
        );
        assert_eq!(load.lineups.len(), 1);
    }

    #[tokio::test]
    async fn disabled_sidecar_is_skipped() {
        let f = fetcher(&[("p.json", PACK), ("optimized.csv", SIDECAR)]);
        let options = LoadOptions {
            sidecar: false,
            ..LoadOptions::default()
        };
        let load = load_reference_pack(&f, "p.json", options).await.unwrap();
        assert_eq!(load.sidecar, SidecarStatus::Skipped);
        assert_eq!(load.lineups.len(), 1);
    }

    #[tokio::test]
    async fn malformed_pack_is_an_error() {
        let f = fetcher(&[("p.json", "{\"players\": 7}")]);
        let err = load_reference_pack(&f, "p.json", LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SidecarError::Ingest(IngestError::MalformedPipelinePayload { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let options = LoadOptions {
            sidecar: true,
            timeout: Duration::from_secs(2),
        };
        let err = load_reference_pack(&HangingFetcher, "p.json", options)
            .await
            .unwrap_err();
        assert!(matches!(err, SidecarError::Timeout { secs: 2, .. }));
    }

    #[tokio::test]
    async fn fs_fetcher_reads_sibling_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("pipeline_2025-12-20.json");
        std::fs::write(&pack_path, PACK).unwrap();
        std::fs::write(dir.path().join("optimized.csv"), SIDECAR).unwrap();

        let load = load_reference_pack(
            &DefaultFetcher::new(),
            pack_path.to_str().unwrap(),
            LoadOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(load.sidecar, SidecarStatus::Loaded { lineups: 2 });
    }
}
