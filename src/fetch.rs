// src/fetch.rs

//! Blocking HTTP fetcher for signing keys and remote source lists
//!
//! Wraps a single reqwest client with a request timeout. `file://` URIs are
//! read straight from disk, matching what the configuration accepts for
//! locally mirrored keys.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::{Error, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("outfit/", env!("CARGO_PKG_VERSION"));

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn download_to_bytes(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            debug!("Reading local file {}", path);
            return std::fs::read(path).map_err(|e| Error::Download {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        debug!("Downloading {}", url);
        let response = self.client.get(url).send().map_err(|e| Error::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::Download {
                url: url.to_string(),
                reason: format!("HTTP status {}", response.status()),
            });
        }
        let bytes = response.bytes().map_err(|e| Error::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    pub fn download_to_string(&self, url: &str) -> Result<String> {
        let bytes = self.download_to_bytes(url)?;
        String::from_utf8(bytes).map_err(|e| Error::Download {
            url: url.to_string(),
            reason: format!("response is not valid UTF-8: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_scheme_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"deb http://example/repo focal main\n").unwrap();

        let fetcher = Fetcher::new().unwrap();
        let url = format!("file://{}", file.path().display());
        let content = fetcher.download_to_string(&url).unwrap();
        assert_eq!(content, "deb http://example/repo focal main\n");
    }

    #[test]
    fn test_file_scheme_missing_file_is_download_error() {
        let fetcher = Fetcher::new().unwrap();
        let err = fetcher
            .download_to_bytes("file:///nonexistent/signing.key")
            .unwrap_err();
        assert!(matches!(err, Error::Download { .. }));
        assert!(err.to_string().contains("/nonexistent/signing.key"));
    }
}
