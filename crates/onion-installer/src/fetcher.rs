use crate::error::InstallerError;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// HTTP GET with timeout and a no-less-safe redirect policy (never follows
/// an https->http downgrade).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::custom(|attempt| {
                let still_secure = attempt.url().scheme() == "https"
                    || attempt.previous().iter().all(|u| u.scheme() != "https");
                if still_secure {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .expect("reqwest client with a custom redirect policy never fails to build");
        Self { client }
    }

    pub async fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, InstallerError> {
        let resp = self.send(url, timeout).await?;
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| map_reqwest_err(url, e))
    }

    pub async fn get_to_file(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<(), InstallerError> {
        let resp = self.send(url, timeout).await?;

        let tmp_path = dest.with_extension("part");
        let mut tmp_file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| InstallerError::Io(e.to_string()))?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_err(url, e))?;
            if let Err(e) = tmp_file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(InstallerError::Io(e.to_string()));
            }
        }
        if let Err(e) = tmp_file.flush().await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(InstallerError::Io(e.to_string()));
        }
        drop(tmp_file);

        tokio::fs::rename(&tmp_path, dest)
            .await
            .map_err(|e| InstallerError::Io(e.to_string()))
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, InstallerError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_err(url, e))?;
        resp.error_for_status()
            .map_err(|e| InstallerError::HttpError(format!("{url}: {e}")))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest_err(url: &str, e: reqwest::Error) -> InstallerError {
    if e.is_timeout() {
        InstallerError::HttpTimeout(url.to_string())
    } else {
        InstallerError::HttpError(format!("{url}: {e}"))
    }
}
