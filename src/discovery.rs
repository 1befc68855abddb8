use std::time::Duration;

use http::Uri;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{DiscoveryConfig, MAX_INTERVAL};
use crate::http::{HttpClient, HttpError};
use crate::target_group::{self, TargetGroup};
use crate::telemetry::RequestsCounter;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read response body: {0}")]
    ReadBody(#[from] hyper::Error),

    #[error("decode targets failed, {0}")]
    Decode(#[from] serde_json::Error),
}

/// Polls one HTTP endpoint and turns its response into target groups.
pub struct Discovery {
    api_url: String,
    uri: Uri,
    refresh_interval: Duration,
    request_timeout: Duration,
    client: HttpClient,
    requests: RequestsCounter,
}

impl Discovery {
    pub fn new(config: &DiscoveryConfig, client: HttpClient, requests: RequestsCounter) -> Self {
        Discovery {
            api_url: config.api_url.clone(),
            uri: config.uri.clone(),
            // longer periods overflow the timer
            refresh_interval: config.refresh_interval.min(MAX_INTERVAL),
            request_timeout: config.request_timeout.min(MAX_INTERVAL),
            client,
            requests,
        }
    }

    /// Fetch the endpoint once and build target groups from the response.
    ///
    /// Every response is counted, and its body is decoded whatever the status
    /// is. Either the whole payload is decoded or nothing is returned.
    pub async fn refresh(&self) -> Result<Vec<TargetGroup>, FetchError> {
        let fetch = async {
            let resp = self.client.get(&self.uri).await?;
            let status = resp.status();
            self.requests.observe(status, &self.api_url);

            if !status.is_success() {
                debug!(
                    message = "unexpected status code, decode anyway",
                    api_url = %self.api_url,
                    %status
                );
            }

            let body = resp.into_body().collect().await?.to_bytes();
            let raw = target_group::decode(&body)?;

            Ok(target_group::build(raw))
        };

        match tokio::time::timeout(self.request_timeout, fetch).await {
            Ok(result) => result,
            Err(_elapsed) => Err(FetchError::Timeout(self.request_timeout)),
        }
    }

    /// Polls until `shutdown` is cancelled, or the receiving side of `output`
    /// is gone.
    ///
    /// The first poll happens immediately. Failed polls are retried after a
    /// full refresh interval, forever. Cancellation is only checked while
    /// waiting, a request in flight always completes first.
    pub async fn run(self, shutdown: CancellationToken, output: mpsc::Sender<Vec<TargetGroup>>) {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.refresh_interval,
            self.refresh_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let groups = match self.refresh().await {
                Ok(groups) => groups,
                Err(err) => {
                    warn!(
                        message = "refresh targets failed",
                        api_url = %self.api_url,
                        %err,
                        retry_in = ?self.refresh_interval,
                    );

                    tokio::select! {
                        biased;

                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.refresh_interval) => {
                            // the retry itself is the poll of this period
                            ticker.reset();
                            continue;
                        }
                    }
                }
            };

            debug!(
                message = "targets refreshed",
                api_url = %self.api_url,
                groups = groups.len(),
            );

            // a slow consumer stalls polling right here
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                result = output.send(groups) => {
                    if result.is_err() {
                        warn!(
                            message = "target groups receiver closed",
                            api_url = %self.api_url,
                        );

                        break;
                    }
                }
            }

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        info!(message = "discovery stopped", api_url = %self.api_url);
    }
}
