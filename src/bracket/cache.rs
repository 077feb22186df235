//! Per-tournament bracket snapshots kept fresh by the change feed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{build_bracket, inspect, Bracket, BracketIssue};
use crate::backend::{BackendError, DataBackend};
use crate::models::TournamentId;
use crate::realtime::{ChangeFeed, Subscription, Topic};

/// A grouped bracket as of `refreshed_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketSnapshot {
    pub bracket: Bracket,
    pub issues: Vec<BracketIssue>,
    pub refreshed_at: DateTime<Utc>,
}

struct Entry {
    snapshot: Arc<BracketSnapshot>,
    _subscription: Subscription,
}

struct Inner {
    backend: Arc<dyn DataBackend>,
    feed: ChangeFeed,
    entries: RwLock<HashMap<TournamentId, Entry>>,
}

/// Shared cache; clones share entries.
#[derive(Clone)]
pub struct BracketCache {
    inner: Arc<Inner>,
}

async fn load(
    backend: &dyn DataBackend,
    tournament_id: &TournamentId,
) -> Result<BracketSnapshot, BackendError> {
    let matches = backend.list_matches(tournament_id).await?;
    let issues = inspect(&matches);
    Ok(BracketSnapshot {
        bracket: build_bracket(matches),
        issues,
        refreshed_at: Utc::now(),
    })
}

impl Inner {
    async fn refresh(&self, tournament_id: &TournamentId) -> Result<(), BackendError> {
        let snapshot = load(self.backend.as_ref(), tournament_id).await?;
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(tournament_id) {
            debug!(
                "Refreshed bracket for {} ({} matches)",
                tournament_id,
                snapshot.bracket.match_count()
            );
            entry.snapshot = Arc::new(snapshot);
        }
        Ok(())
    }
}

impl BracketCache {
    pub fn new(backend: Arc<dyn DataBackend>, feed: ChangeFeed) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                feed,
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Current snapshot, if this tournament has been loaded.
    pub async fn snapshot(&self, tournament_id: &TournamentId) -> Option<Arc<BracketSnapshot>> {
        self.inner
            .entries
            .read()
            .await
            .get(tournament_id)
            .map(|e| e.snapshot.clone())
    }

    /// Return the cached snapshot, loading it and watching the tournament's
    /// matches on first use. A failed first load is returned as an error and
    /// nothing is cached.
    pub async fn get_or_fetch(
        &self,
        tournament_id: &TournamentId,
    ) -> Result<Arc<BracketSnapshot>, BackendError> {
        if let Some(snapshot) = self.snapshot(tournament_id).await {
            return Ok(snapshot);
        }

        // Notices that land while the first load is in flight find no entry
        // to refresh, so count them and reload once the entry exists.
        let (subscription, changes) = self.watch(tournament_id.clone());
        let seen = changes.load(Ordering::SeqCst);
        let snapshot = Arc::new(load(self.inner.backend.as_ref(), tournament_id).await?);

        let (snapshot, stale) = {
            let mut entries = self.inner.entries.write().await;
            let entry = entries.entry(tournament_id.clone()).or_insert_with(|| {
                info!("Watching bracket for tournament {}", tournament_id);
                Entry {
                    snapshot: snapshot.clone(),
                    _subscription: subscription,
                }
            });
            // Checked under the write lock: any later notice refreshes the
            // entry inserted here.
            (entry.snapshot.clone(), changes.load(Ordering::SeqCst) != seen)
        };

        if !stale {
            return Ok(snapshot);
        }
        debug!("Bracket for {} changed during first load", tournament_id);
        match self.inner.refresh(tournament_id).await {
            Ok(()) => Ok(self.snapshot(tournament_id).await.unwrap_or(snapshot)),
            Err(e) => {
                warn!(
                    "Bracket refresh for {} failed, keeping previous snapshot: {}",
                    tournament_id, e
                );
                Ok(snapshot)
            }
        }
    }

    /// Re-fetch a loaded tournament now. On failure the previous snapshot
    /// stays in place.
    pub async fn refresh(&self, tournament_id: &TournamentId) -> Result<(), BackendError> {
        self.inner.refresh(tournament_id).await
    }

    /// Drop a tournament's snapshot and stop watching it.
    pub async fn forget(&self, tournament_id: &TournamentId) -> bool {
        self.inner
            .entries
            .write()
            .await
            .remove(tournament_id)
            .is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe to the tournament's matches. The counter goes up on every
    /// notice, before the refresh runs.
    fn watch(&self, tournament_id: TournamentId) -> (Subscription, Arc<AtomicU64>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let changes = Arc::new(AtomicU64::new(0));
        let counter = changes.clone();
        let topic = Topic::Matches(tournament_id.clone());
        let subscription = self.inner.feed.subscribe_async(topic, move |_notice| {
            counter.fetch_add(1, Ordering::SeqCst);
            let weak = weak.clone();
            let tournament_id = tournament_id.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = inner.refresh(&tournament_id).await {
                    warn!(
                        "Bracket refresh for {} failed, keeping previous snapshot: {}",
                        tournament_id, e
                    );
                }
            }
        });
        (subscription, changes)
    }
}
