use async_trait::async_trait;
use metrics::Registry;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{CancelPolicy, Config, ConfigError, DiscoveryConfig};
use crate::discovery::Discovery;
use crate::http::HttpClient;
use crate::target_group::TargetGroup;
use crate::telemetry::RequestsCounter;

/// The downstream side of a discovery loop. Every value received is the
/// complete current set of target groups, not a diff against the previous one.
///
/// A consumer must keep reading, the loop feeding it stalls otherwise.
#[async_trait]
pub trait Consumer: Send {
    async fn run(
        self: Box<Self>,
        input: mpsc::Receiver<Vec<TargetGroup>>,
        shutdown: CancellationToken,
    );
}

/// Starts one discovery loop for each configured source.
pub struct Coordinator {
    sources: Vec<DiscoveryConfig>,
    policy: CancelPolicy,
    client: HttpClient,
    requests: RequestsCounter,
}

impl Coordinator {
    /// Validate the config, nothing is started if it's invalid.
    pub fn new(config: &Config, registry: &Registry) -> Result<Coordinator, ConfigError> {
        let sources = config.sources()?;

        Ok(Coordinator {
            sources,
            policy: config.cancel_policy,
            client: HttpClient::new(),
            requests: RequestsCounter::register(registry),
        })
    }

    pub fn sources(&self) -> &[DiscoveryConfig] {
        &self.sources
    }

    /// Spawn a discovery loop and its consumer for every source, the
    /// returned `Running` owns their cancellation handles.
    pub fn spawn<F>(self, root: CancellationToken, mut make_consumer: F) -> Running
    where
        F: FnMut(&DiscoveryConfig) -> Box<dyn Consumer>,
    {
        let mut tasks = JoinSet::new();
        let mut handles = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let token = root.child_token();
            let (tx, rx) = mpsc::channel(1);

            let discovery = Discovery::new(source, self.client.clone(), self.requests.clone());
            let consumer = make_consumer(source);
            let span = info_span!(
                "discovery",
                api_url = %source.api_url,
                output = ?source.output_file,
            );

            tasks.spawn(consumer.run(rx, token.clone()).instrument(span.clone()));

            let loop_token = token.clone();
            let root = root.clone();
            let policy = self.policy;
            tasks.spawn(
                async move {
                    discovery.run(loop_token, tx).await;

                    if policy == CancelPolicy::Siblings && !root.is_cancelled() {
                        warn!(message = "discovery terminated, cancelling all discoverers");
                        root.cancel();
                    }
                }
                .instrument(span),
            );

            info!(
                message = "discovery started",
                api_url = %source.api_url,
                output = ?source.output_file,
                interval = ?source.refresh_interval,
            );

            handles.push((source.api_url.clone(), token));
        }

        Running {
            root,
            handles,
            tasks,
        }
    }
}

/// Running discovery loops and consumers.
pub struct Running {
    root: CancellationToken,
    handles: Vec<(String, CancellationToken)>,
    tasks: JoinSet<()>,
}

impl Running {
    /// The token everything running derives from.
    pub fn root(&self) -> &CancellationToken {
        &self.root
    }

    /// Cancel every discovery loop polling `api_url` and their consumers,
    /// returns false if there is no such source.
    ///
    /// With `CancelPolicy::Siblings` this ends up cancelling all of them.
    pub fn cancel(&self, api_url: &str) -> bool {
        let mut found = false;
        for (_, token) in self.handles.iter().filter(|(url, _)| url == api_url) {
            token.cancel();
            found = true;
        }

        found
    }

    /// Cancel every discovery loop, consumer and the root.
    pub fn shutdown_all(&self) {
        for (_, token) in &self.handles {
            token.cancel();
        }

        self.root.cancel();
    }

    /// Wait for every task to finish.
    pub async fn wait(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                error!(message = "discovery task failed", %err);
            }
        }
    }
}
