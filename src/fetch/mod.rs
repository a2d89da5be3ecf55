mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use tracing::debug;

/// Fetches one named file from a source root, which is either a base URL or
/// a local directory.
///
/// Returns `Ok(None)` when the file does not exist (HTTP 404 or filesystem
/// not-found); for day-probed ingestion that is the normal "no more data"
/// stopping condition, not an error. Every other failure propagates.
pub async fn fetch_optional<C: HttpClient>(
    client: &C,
    source: &str,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    if source.starts_with("http") {
        let url = format!("{}/{}", source.trim_end_matches('/'), name);
        let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
        let resp = client.execute(req).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(url, "Source file not found");
            return Ok(None);
        }
        if !resp.status().is_success() {
            bail!("fetching {url}: HTTP {}", resp.status());
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    } else {
        let path = std::path::Path::new(source).join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Source file not found");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

/// Like [`fetch_optional`], but the file must exist: the fixed time-series
/// inputs are not probed, so their absence is a hard error.
pub async fn fetch_required<C: HttpClient>(client: &C, source: &str, name: &str) -> Result<Vec<u8>> {
    fetch_optional(client, source, name)
        .await?
        .with_context(|| format!("required source file {name} not found under {source}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> String {
        let dir = format!("{}/{}", env::temp_dir().display(), name);
        let _ = fs::create_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_local_file_found() {
        let dir = temp_dir("epitrack_fetch_found");
        fs::write(format!("{dir}/01-22-2020.csv"), b"a,b\n").unwrap();

        let client = BasicClient::new();
        let bytes = fetch_optional(&client, &dir, "01-22-2020.csv")
            .await
            .unwrap();
        assert_eq!(bytes.as_deref(), Some(b"a,b\n".as_slice()));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_local_file_missing_is_none() {
        let dir = temp_dir("epitrack_fetch_missing");
        let client = BasicClient::new();
        let bytes = fetch_optional(&client, &dir, "01-01-1999.csv")
            .await
            .unwrap();
        assert!(bytes.is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_required_missing_is_error() {
        let dir = temp_dir("epitrack_fetch_required");
        let client = BasicClient::new();
        let result = fetch_required(&client, &dir, "nope.csv").await;
        assert!(result.is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
