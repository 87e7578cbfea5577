//! Fallback playlist refill requests
//!
//! The fallback list is generated elsewhere; the player only asks for more
//! entries when it is running low, at most once per cooldown.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// External generator of `auto_playlist_queue` entries
#[async_trait]
pub trait FallbackRefiller: Send + Sync {
    async fn request_refill(&self) -> Result<()>;
}

/// Asks the generator over HTTP (`POST <refill_url>`)
pub struct HttpRefillClient {
    client: reqwest::Client,
    url: String,
}

impl HttpRefillClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FallbackRefiller for HttpRefillClient {
    async fn request_refill(&self) -> Result<()> {
        let response = self.client.post(&self.url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Refill(format!(
                "{} answered {}",
                self.url,
                response.status()
            )))
        }
    }
}

/// Spaces refill requests at least `cooldown` apart
///
/// A failed request still starts the cooldown.
pub struct RateLimitedRefill {
    inner: Arc<dyn FallbackRefiller>,
    cooldown: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedRefill {
    pub fn new(inner: Arc<dyn FallbackRefiller>, cooldown: Duration) -> Self {
        Self {
            inner,
            cooldown,
            last_request: Mutex::new(None),
        }
    }

    /// Request a refill unless one was requested within the cooldown
    ///
    /// Returns `Ok(true)` when a request was sent.
    pub async fn maybe_refill(&self) -> Result<bool> {
        {
            let mut last = self.last_request.lock().await;
            if let Some(at) = *last {
                if at.elapsed() < self.cooldown {
                    debug!("Fallback refill suppressed (cooldown)");
                    return Ok(false);
                }
            }
            *last = Some(Instant::now());
        }

        info!("Requesting fallback playlist refill");
        self.inner.request_refill().await?;
        Ok(true)
    }
}
