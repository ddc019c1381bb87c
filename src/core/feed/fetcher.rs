use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};

/// Cache validators carried over from the previous successful fetch of a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub validators: Validators,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Updated(FetchedPayload),
    NotModified,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
}

pub async fn fetch_url(
    client: &reqwest::Client,
    url: &str,
    validators: &Validators,
) -> Result<FetchOutcome, FetchError> {
    let mut request = client.get(url);
    if let Some(value) = validators.etag.as_deref() {
        request = request.header(IF_NONE_MATCH, value);
    }
    if let Some(value) = validators.last_modified.as_deref() {
        request = request.header(IF_MODIFIED_SINCE, value);
    }

    let response = request.send().await?;
    let status = response.status();
    if status.as_u16() == 304 {
        return Ok(FetchOutcome::NotModified);
    }
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let validators = Validators {
        etag: header_value(&response, ETAG),
        last_modified: header_value(&response, LAST_MODIFIED),
    };
    let content_type = header_value(&response, CONTENT_TYPE);
    let body = response.bytes().await?.to_vec();

    Ok(FetchOutcome::Updated(FetchedPayload {
        body,
        content_type,
        validators,
    }))
}

/// Retry transport errors and 5xx responses up to `max_retries` extra attempts
/// with linear backoff. The default configuration passes 0, matching the
/// one-shot behavior of the page this service replaces.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    validators: &Validators,
    max_retries: usize,
) -> Result<FetchOutcome, FetchError> {
    let mut attempt = 0_usize;
    loop {
        match fetch_url(client, url, validators).await {
            Ok(outcome) => return Ok(outcome),
            Err(error) => {
                let retryable = matches!(error, FetchError::Request(_))
                    || matches!(error, FetchError::HttpStatus(code) if code >= 500);
                if !retryable || attempt >= max_retries {
                    return Err(error);
                }
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
            }
        }
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}
