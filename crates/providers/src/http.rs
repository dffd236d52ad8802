//! Shared request plumbing for the HTTP-backed providers.

use crate::ProviderError;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Sends `body` as JSON to `url`, retrying transient failures up to
/// `max_retries` additional times with exponential backoff.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &B,
    auth: Option<&str>,
    max_retries: usize,
) -> Result<Response, ProviderError> {
    let mut attempt = 0usize;
    loop {
        let mut builder = client.post(url).json(body);
        if let Some(key) = auth {
            builder = builder.bearer_auth(key);
        }
        match send_checked(builder).await {
            Ok(resp) => return Ok(resp),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = retry_backoff(attempt);
                warn!(%url, attempt, ?delay, error = %err, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Sends the request and turns non-2xx statuses into `ProviderError::Status`.
pub(crate) async fn send_checked(builder: RequestBuilder) -> Result<Response, ProviderError> {
    let resp = builder
        .send()
        .await
        .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(resp)
}

pub(crate) fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(500));
        assert_eq!(retry_backoff(2), Duration::from_millis(1000));
        assert_eq!(retry_backoff(5), retry_backoff(9));
    }
}
