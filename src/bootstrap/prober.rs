//! Contact Point Prober
//!
//! One task per discovered contact point. It keeps asking the contact point for
//! its seed nodes and reports every answer to the coordinator. A prober that
//! hears nothing for `probing_failure_timeout` reports `ProbingFailed` once and
//! stops; the coordinator decides whether to start a new one.

use super::client::SeedNodesClient;
use super::config::ContactPointSettings;
use super::coordinator::CoordinatorMessage;
use super::types::SeedNodesObservation;
use crate::discovery::types::ContactPointCandidate;

use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// `base + base * jitter * random`, with `random` in `[0, 1)`.
pub fn effective_probe_interval(base: Duration, jitter: f64, random: f64) -> Duration {
    base + base.mul_f64(jitter * random)
}

/// Owned by the coordinator. Dropping the handle stops the prober.
pub struct ProberHandle {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProberHandle {
    /// Identifies this prober among all probers ever spawned for a contact point.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ProberHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct ContactPointProber {
    id: u64,
    contact_point: ContactPointCandidate,
    base_uri: Url,
    settings: ContactPointSettings,
    client: Arc<dyn SeedNodesClient>,
    coordinator: mpsc::Sender<CoordinatorMessage>,
    cancel: CancellationToken,
}

impl ContactPointProber {
    /// Starts probing `base_uri`. The prober stops when `parent` is cancelled.
    ///
    /// `id` is echoed in `ProbingFailed` so stale failures can be told apart.
    pub fn spawn(
        id: u64,
        contact_point: ContactPointCandidate,
        base_uri: Url,
        settings: ContactPointSettings,
        client: Arc<dyn SeedNodesClient>,
        coordinator: mpsc::Sender<CoordinatorMessage>,
        parent: &CancellationToken,
    ) -> ProberHandle {
        let cancel = parent.child_token();
        let prober = Self {
            id,
            contact_point,
            base_uri,
            settings,
            client,
            coordinator,
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(prober.run());
        ProberHandle { id, cancel, task }
    }

    async fn run(self) {
        let timeout = self.settings.probing_failure_timeout;
        let mut deadline = Instant::now() + timeout;

        tracing::debug!(
            "Started probing contact point {} at {}",
            self.contact_point,
            self.base_uri
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = tokio::time::timeout(timeout, self.client.probe(&self.base_uri, timeout)) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!("Probe timed out after {:?}", timeout)),
                    }
                }
            };

            match outcome {
                Ok(response) => {
                    let now = Instant::now();
                    deadline = now + timeout;

                    tracing::trace!(
                        "Contact point {} reported {} seed node(s)",
                        self.contact_point,
                        response.seed_nodes.len()
                    );

                    let observation = SeedNodesObservation {
                        observed_at: now,
                        contact_point: self.contact_point.clone(),
                        observed_seed_nodes: response.seed_addresses(),
                        source_address: response.self_node,
                    };

                    let sent = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        sent = self.coordinator.send(CoordinatorMessage::ObtainedSeedNodesObservation(observation)) => sent,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if Instant::now() > deadline {
                        tracing::error!(
                            "Probing contact point {} failed for longer than {:?}, giving up: {:#}",
                            self.contact_point,
                            timeout,
                            e
                        );
                        let failed = CoordinatorMessage::ProbingFailed {
                            contact_point: self.contact_point.clone(),
                            prober_id: self.id,
                            cause: format!("{:#}", e),
                        };
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => {}
                            _ = self.coordinator.send(failed) => {}
                        }
                        break;
                    }

                    tracing::warn!(
                        "Probing contact point {} failed, retrying: {:#}",
                        self.contact_point,
                        e
                    );
                }
            }

            let delay = effective_probe_interval(
                self.settings.probe_interval,
                self.settings.probe_interval_jitter,
                rand::random::<f64>(),
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::debug!("Stopped probing contact point {}", self.contact_point);
    }
}
