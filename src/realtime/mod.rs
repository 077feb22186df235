//! Change notifications.
//!
//! A [`ChangeFeed`] fans "this may have changed" signals out to subscribers,
//! keyed by [`Topic`]. Notices carry no row data; subscribers re-fetch.
//! The in-memory backend publishes on every write; against the HTTP backend a
//! [`ChangePoller`] watches the topics that currently have subscribers.

mod poller;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::TournamentId;

pub use poller::ChangePoller;

/// Per-topic buffer; a subscriber that falls further behind sees a lag,
/// which is handled as one more change.
const CHANNEL_CAPACITY: usize = 16;

/// What a subscriber is watching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Any tournament row.
    Tournaments,
    /// Matches of one tournament.
    Matches(TournamentId),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Tournaments => write!(f, "tournaments"),
            Topic::Matches(id) => write!(f, "matches:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub topic: Topic,
    pub at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn now(topic: Topic) -> Self {
        Self {
            topic,
            at: Utc::now(),
        }
    }
}

/// Topic-keyed broadcast hub. Cheap to clone; clones share channels.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    channels: Arc<Mutex<HashMap<Topic, broadcast::Sender<ChangeNotice>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &Topic) -> broadcast::Sender<ChangeNotice> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut channels);
        channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Signal a change. Returns how many live receivers were notified.
    pub fn publish(&self, topic: Topic) -> usize {
        let sender = {
            let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            channels.get(&topic).cloned()
        };
        match sender {
            Some(tx) => {
                let delivered = tx.send(ChangeNotice::now(topic.clone())).unwrap_or(0);
                debug!("Published change on {} to {} receivers", topic, delivered);
                delivered
            }
            None => 0,
        }
    }

    /// Raw receiver for callers that want to drive the loop themselves.
    pub fn receiver(&self, topic: &Topic) -> broadcast::Receiver<ChangeNotice> {
        self.sender(topic).subscribe()
    }

    /// Run `callback` on every change of `topic` until the returned
    /// subscription is dropped or unsubscribed. Must be called inside a
    /// tokio runtime.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(ChangeNotice) + Send + Sync + 'static,
    {
        self.subscribe_async(topic, move |notice| {
            callback(notice);
            async {}
        })
    }

    /// Like [`subscribe`](Self::subscribe), awaiting each callback before
    /// taking the next notice.
    pub fn subscribe_async<F, Fut>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(ChangeNotice) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = self.receiver(&topic);
        let task_topic = topic.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(notice) => callback(notice).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscriber on {} lagged by {} notices", task_topic, skipped);
                        callback(ChangeNotice::now(task_topic.clone())).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription { topic, handle }
    }

    /// Topics with at least one live receiver. Channels nobody listens to
    /// any more are dropped here.
    pub fn active_topics(&self) -> Vec<Topic> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut channels);
        let mut topics: Vec<Topic> = channels.keys().cloned().collect();
        topics.sort();
        topics
    }
}

fn prune(channels: &mut HashMap<Topic, broadcast::Sender<ChangeNotice>>) {
    channels.retain(|_, tx| tx.receiver_count() > 0);
}

/// Handle to a running subscription. Dropping it unsubscribes.
pub struct Subscription {
    topic: Topic,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let feed = ChangeFeed::new();
        assert_eq!(feed.publish(Topic::Tournaments), 0);
        assert!(feed.active_topics().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_receives_only_its_topic() {
        let feed = ChangeFeed::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = feed.subscribe(Topic::Matches("t-1".into()), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        feed.publish(Topic::Matches("t-1".into()));
        feed.publish(Topic::Matches("t-2".into()));
        feed.publish(Topic::Tournaments);
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_callbacks() {
        let feed = ChangeFeed::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sub = feed.subscribe(Topic::Tournaments, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        feed.publish(Topic::Tournaments);
        settle().await;
        sub.unsubscribe();
        settle().await;
        feed.publish(Topic::Tournaments);
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(feed.active_topics().is_empty());
    }

    #[tokio::test]
    async fn test_active_topics() {
        let feed = ChangeFeed::new();
        let _a = feed.subscribe(Topic::Matches("t-1".into()), |_| {});
        let _b = feed.subscribe(Topic::Tournaments, |_| {});

        assert_eq!(
            feed.active_topics(),
            vec![Topic::Tournaments, Topic::Matches("t-1".into())]
        );
    }

    #[tokio::test]
    async fn test_dropped_topics_release_their_channels() {
        let feed = ChangeFeed::new();
        let subs: Vec<Subscription> = (0..3)
            .map(|i| feed.subscribe(Topic::Matches(format!("t-{}", i).into()), |_| {}))
            .collect();
        let _kept = feed.subscribe(Topic::Tournaments, |_| {});
        assert_eq!(feed.channels.lock().unwrap().len(), 4);

        drop(subs);
        settle().await;

        assert_eq!(feed.active_topics(), vec![Topic::Tournaments]);
        assert_eq!(feed.channels.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_topic_display() {
        assert_eq!(Topic::Matches("abc".into()).to_string(), "matches:abc");
        assert_eq!(Topic::Tournaments.to_string(), "tournaments");
    }
}
