//! HTTP client for the authoritative source

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::changeset::ChangeSet;
use super::errors::{SyncError, SyncResult};
use crate::integrity::PublicKeyEntry;

/// Wire form of `GET /public-key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// All currently valid signing keys
    pub keys: Vec<PublicKeyEntry>,
}

/// Pulls changesets and public keys from the source.
///
/// Every request carries the configured timeout; a slow source surfaces as
/// a transport error, never a hang.
#[derive(Debug, Clone)]
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
}

impl SourceClient {
    /// Create a client for the given source URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the source base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pull changes for one table since the given cursor timestamp.
    pub async fn pull(&self, table: &str, since: Option<DateTime<Utc>>) -> SyncResult<ChangeSet> {
        let mut url = format!("{}/sync/{}", self.base_url, table);
        if let Some(since) = since {
            url.push_str(&format!("?since={}", since.timestamp_millis()));
        }

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::transport(format!("Pull request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::transport(format!(
                "Pull for table {} returned HTTP {}",
                table,
                response.status()
            )));
        }

        response
            .json::<ChangeSet>()
            .await
            .map_err(|e| SyncError::transport(format!("Malformed changeset response: {}", e)))
    }

    /// Fetch the currently valid public keys.
    pub async fn fetch_keys(&self) -> SyncResult<Vec<PublicKeyEntry>> {
        let url = format!("{}/public-key", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::transport(format!("Key fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::transport(format!(
                "Key fetch returned HTTP {}",
                response.status()
            )));
        }

        let body: PublicKeyResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transport(format!("Malformed key response: {}", e)))?;

        Ok(body.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = SourceClient::new("http://source:7800/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://source:7800");
    }

    #[test]
    fn test_key_response_round_trip() {
        let body = r#"{"keys":[{"key_id":"k1","public_key":"QUJD","algorithm":"ed25519-sha256"}]}"#;
        let parsed: PublicKeyResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.keys.len(), 1);
        assert_eq!(parsed.keys[0].key_id, "k1");
    }
}
