#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! HTTP client for pakt downloads
//!
//! A thin reqwest wrapper with connection pooling, retry logic, and
//! download progress reporting over the event channel.

use futures::StreamExt;
use pakt_errors::{Error, NetworkError};
use pakt_events::{Event, EventSender, EventSenderExt};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            user_agent: format!("pakt/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to
    /// initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with
    /// default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    /// Execute a GET request with retries, failing on non-success status
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts
    /// or the server answers with a non-success status.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        let response = self.retry_request(|| self.client.get(url).send()).await?;
        if !response.status().is_success() {
            return Err(NetworkError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            }
            .into());
        }
        Ok(response)
    }

    /// GET a JSON document
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not valid
    /// JSON for the target type.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let response = self.get(url).await?;
        response
            .json()
            .await
            .map_err(|e| NetworkError::DownloadFailed(format!("{url}: {e}")).into())
    }

    /// Download a URL to a file, streaming chunks and reporting progress
    /// on the event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the destination cannot
    /// be written.
    pub async fn download_to(&self, url: &str, dest: &Path, tx: &EventSender) -> Result<u64, Error> {
        let response = self.get(url).await?;
        let total = response.content_length();

        tx.emit(Event::DownloadStarted {
            url: url.to_string(),
            size: total,
        });

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk).await?;

            downloaded += chunk.len() as u64;
            tx.emit(Event::DownloadProgress {
                url: url.to_string(),
                bytes_downloaded: downloaded,
                total_bytes: total.unwrap_or(0),
            });
        }

        tx.emit(Event::DownloadCompleted {
            url: url.to_string(),
            size: downloaded,
        });
        Ok(downloaded)
    }

    /// Execute a request with retries
    async fn retry_request<F, Fut>(&self, mut f: F) -> Result<Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay * attempt).await;
            }

            match f().await {
                Ok(response) => {
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        if let Some(retry_after) = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                        {
                            return Err(NetworkError::RateLimited {
                                seconds: retry_after,
                            }
                            .into());
                        }
                    }

                    // Retry server errors; surface everything else.
                    if response.status().is_server_error() && attempt < self.config.retry_count {
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) if e.is_timeout() => Err(NetworkError::Timeout {
                url: e
                    .url()
                    .map(std::string::ToString::to_string)
                    .unwrap_or_default(),
            }
            .into()),
            Some(e) if e.is_connect() => Err(NetworkError::ConnectionRefused(e.to_string()).into()),
            Some(e) => Err(NetworkError::DownloadFailed(e.to_string()).into()),
            None => Err(NetworkError::DownloadFailed("unknown error".to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_identifies_pakt() {
        let config = NetConfig::default();
        assert!(config.user_agent.starts_with("pakt/"));
        assert_eq!(config.retry_count, 3);
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(NetClient::with_defaults().is_ok());
    }
}
