//! Delivery and retry driver for suggestion requests
//!
//! The transport is a trait so tests can script failures; the production
//! implementation posts to the configured generateContent endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, warn};
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::util::truncate;

use super::payload::{build_request, GenerateContentRequest};
use super::{parse, RequestOutcome, SuggestError, SuggestionRequest};

/// Total delivery attempts per request. Fixed policy: retry r waits 2^r
/// seconds (1s, 2s), no jitter, no wait after the final attempt.
const MAX_ATTEMPTS: u32 = 3;

/// Why one delivery attempt failed
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint answered with a non-success status
    #[error("status {status}: {detail}")]
    Status { status: u16, detail: String },
    /// The request never completed (connect failure, timeout, TLS, ...)
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Delivery seam for one generateContent call. Implementations return the
/// raw response body on a success status and an error otherwise.
#[async_trait]
pub trait SuggestionTransport: Send + Sync {
    async fn deliver(&self, body: &GenerateContentRequest) -> Result<String, TransportError>;
}

/// Production transport: POST to the configured Gemini endpoint
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(config: &Config, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let url = config.request_url(api_key)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SuggestionTransport for HttpTransport {
    async fn deliver(&self, body: &GenerateContentRequest) -> Result<String, TransportError> {
        // The URL carries the API key, so it must never appear in logs here.
        let response = self.client.post(self.url.clone()).json(body).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status,
                detail: truncate(&detail, 200),
            })
        }
    }
}

/// Drives one suggestion request end to end: build, deliver with retries,
/// parse. Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct SuggestionRequester {
    transport: Arc<dyn SuggestionTransport>,
}

impl SuggestionRequester {
    /// Wire up the production HTTP transport from config and the stored key
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.get_api_key().ok_or_else(|| {
            anyhow::anyhow!("No API key configured. Run 'gradepilot --setup' to get started.")
        })?;
        let transport = HttpTransport::new(config, &api_key)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn SuggestionTransport>) -> Self {
        Self { transport }
    }

    /// Ask the service for a grade suggestion.
    ///
    /// Always settles: transient delivery failures are retried with
    /// exponential backoff up to the attempt cap, and every failure mode
    /// degrades to a Failed outcome carrying a displayable default result.
    pub async fn request_suggestion(&self, request: &SuggestionRequest) -> RequestOutcome {
        let body = build_request(request);

        let mut attempt = 0;
        while attempt < MAX_ATTEMPTS {
            match self.transport.deliver(&body).await {
                Ok(raw) => {
                    return match parse::parse_reply(&raw) {
                        Ok(result) => RequestOutcome::Succeeded(result),
                        Err(err) => {
                            warn!("unusable reply ({}): {}", err, truncate(&raw, 200));
                            err.into()
                        }
                    };
                }
                Err(err) => {
                    attempt += 1;
                    if attempt < MAX_ATTEMPTS {
                        let backoff_secs = 2u64.pow(attempt - 1);
                        warn!(
                            "delivery attempt {}/{} failed: {}; retrying in {}s",
                            attempt, MAX_ATTEMPTS, err, backoff_secs
                        );
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    } else {
                        error!(
                            "delivery attempt {}/{} failed: {}; giving up",
                            attempt, MAX_ATTEMPTS, err
                        );
                    }
                }
            }
        }

        SuggestError::DeliveryFailed {
            attempts: MAX_ATTEMPTS,
        }
        .into()
    }
}
