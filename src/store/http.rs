// src/store/http.rs

//! HTTP release store.
//!
//! Talks to a release-hosting middleware over four endpoints:
//! `GET /releases`, `GET /manifest/v{version}`,
//! `GET /download/v{version}/{path}`, and `POST /publish`.
//!
//! Requests carry a bounded timeout and transient transport failures are
//! retried a fixed number of times with linear backoff. A 404 maps to
//! [`Error::NotFound`]; everything else non-successful is a retryable
//! [`Error::Transport`] for the caller's policy to handle.

use crate::error::{Error, Result};
use crate::release::Manifest;
use crate::store::{ReleaseId, ReleaseStore};
use crate::version::Version;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Default timeout for HTTP requests (30 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests.
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, scaled linearly by attempt.
const RETRY_DELAY_MS: u64 = 1000;

pub struct HttpReleaseStore {
    client: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    manifest: &'a Manifest,
    files: Vec<PublishFile>,
}

#[derive(Serialize)]
struct PublishFile {
    path: String,
    size: u64,
    content_hex: String,
}

#[derive(Deserialize)]
struct PublishResponse {
    release_id: String,
}

impl HttpReleaseStore {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// GET with retry on transport failure. Status errors are not retried:
    /// a 404 is a definitive answer, and other statuses are surfaced for
    /// the caller's retry policy.
    fn get_with_retry(&self, url: &str, what: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Err(Error::NotFound(what.to_string()));
                    }
                    if !status.is_success() {
                        return Err(Error::Transport(format!("HTTP {} from {}", status, url)));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Transport(format!(
                            "failed to fetch {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!(url, attempt, error = %e, "request failed, retrying");
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl ReleaseStore for HttpReleaseStore {
    fn list_versions(&self) -> Result<Vec<Version>> {
        let url = self.url("/releases");
        let response = self.get_with_retry(&url, "release listing")?;
        let tags: Vec<String> = response
            .json()
            .map_err(|e| Error::Transport(format!("failed to parse release listing: {e}")))?;

        let mut versions = Vec::with_capacity(tags.len());
        for tag in tags {
            versions.push(Version::parse(&tag)?);
        }
        Ok(versions)
    }

    fn fetch_manifest(&self, version: Version) -> Result<Manifest> {
        let url = self.url(&format!("/manifest/v{}", version));
        let response = self.get_with_retry(&url, &format!("manifest for version {}", version))?;
        let body = response
            .text()
            .map_err(|e| Error::Transport(format!("failed to read manifest body: {e}")))?;
        Manifest::from_json(&body)
    }

    fn fetch_file(&self, version: Version, rel_path: &str) -> Result<Vec<u8>> {
        crate::fsutil::validate_rel_path(rel_path)?;

        let url = self.url(&format!("/download/v{}/{}", version, rel_path));
        let response = self.get_with_retry(
            &url,
            &format!("file {} in release {}", rel_path, version),
        )?;
        let bytes = response
            .bytes()
            .map_err(|e| Error::Transport(format!("failed to read download body: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn publish(&self, manifest: &Manifest, files: &[(String, Vec<u8>)]) -> Result<ReleaseId> {
        manifest.validate()?;

        let payload = PublishRequest {
            manifest,
            files: files
                .iter()
                .map(|(path, bytes)| PublishFile {
                    path: path.clone(),
                    size: bytes.len() as u64,
                    content_hex: hex::encode(bytes),
                })
                .collect(),
        };

        let url = self.url("/publish");
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| Error::Transport(format!("failed to publish release: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {} from {}", status, url)));
        }

        let body: PublishResponse = response
            .json()
            .map_err(|e| Error::Transport(format!("failed to parse publish response: {e}")))?;

        info!(version = %manifest.version, release_id = %body.release_id, "published release");
        Ok(ReleaseId(body.release_id))
    }
}
