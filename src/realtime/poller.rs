//! Change detection by polling.
//!
//! For backends that do not push notifications, the poller re-reads every
//! topic that has live subscribers, hashes the rows and publishes when the
//! hash moves. The first read of a topic only records a baseline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{ChangeFeed, Topic};
use crate::backend::{BackendError, DataBackend, TournamentOrder, TournamentQuery};

pub struct ChangePoller {
    backend: Arc<dyn DataBackend>,
    feed: ChangeFeed,
    interval: Duration,
    fingerprints: HashMap<Topic, String>,
}

impl ChangePoller {
    pub fn new(backend: Arc<dyn DataBackend>, feed: ChangeFeed, interval: Duration) -> Self {
        Self {
            backend,
            feed,
            interval,
            fingerprints: HashMap::new(),
        }
    }

    async fn fingerprint(&self, topic: &Topic) -> Result<String, BackendError> {
        let bytes = match topic {
            Topic::Tournaments => {
                let mut rows = self
                    .backend
                    .list_tournaments(TournamentQuery {
                        order: TournamentOrder::CreatedDesc,
                        limit: None,
                    })
                    .await?;
                rows.sort_by(|a, b| a.id.cmp(&b.id));
                serde_json::to_vec(&rows)?
            }
            Topic::Matches(tournament_id) => {
                let mut rows = self.backend.list_matches(tournament_id).await?;
                rows.sort_by(|a, b| a.id.cmp(&b.id));
                serde_json::to_vec(&rows)?
            }
        };
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Check every watched topic once; returns the topics that changed.
    pub async fn poll_once(&mut self) -> Vec<Topic> {
        let topics = self.feed.active_topics();
        self.fingerprints.retain(|topic, _| topics.contains(topic));

        let mut changed = Vec::new();
        for topic in topics {
            let digest = match self.fingerprint(&topic).await {
                Ok(digest) => digest,
                Err(e) => {
                    warn!("Polling {} failed: {}", topic, e);
                    continue;
                }
            };
            if let Some(previous) = self.fingerprints.insert(topic.clone(), digest.clone()) {
                if previous != digest {
                    self.feed.publish(topic.clone());
                    changed.push(topic);
                }
            }
        }
        changed
    }

    /// Poll forever at the configured interval.
    pub async fn run(mut self) {
        info!(
            "Polling {} backend for changes every {:?}",
            self.backend.name(),
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let changed = self.poll_once().await;
            if !changed.is_empty() {
                debug!("Detected changes on {} topics", changed.len());
            }
        }
    }
}
