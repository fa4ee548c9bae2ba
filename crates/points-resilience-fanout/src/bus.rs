//! Topic-based publish/subscribe bus with last-event replay.

use crate::error::FanoutError;
use crate::event::SyncEvent;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;
const SEEN_WINDOW: usize = 1024;

struct Topic {
    sender: broadcast::Sender<SyncEvent>,
    last: Option<SyncEvent>,
}

struct BusInner {
    topics: Mutex<HashMap<String, Topic>>,
    capacity: usize,
}

/// An in-process publish/subscribe bus.
///
/// Delivery is at-least-once: each topic retains its most recent event and
/// every new subscriber receives it before anything published later. A
/// subscriber that joins after a publish therefore still observes it, and a
/// subscriber may see the same event more than once.
#[derive(Clone)]
pub struct SyncBus {
    inner: Arc<BusInner>,
}

impl SyncBus {
    /// Creates a bus whose topics buffer up to 64 events per subscriber.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus with a per-subscriber buffer of `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Publishes `event` on `topic` and returns the number of live subscribers
    /// it was handed to.
    ///
    /// The event becomes the topic's retained event unless the retained one
    /// is newer, so re-publishing an old event never hides a later one.
    pub fn publish(&self, topic: &str, event: SyncEvent) -> usize {
        let mut topics = self.lock();
        let entry = Self::topic_entry(&mut topics, topic, self.inner.capacity);
        if entry
            .last
            .as_ref()
            .map_or(true, |last| last.timestamp <= event.timestamp)
        {
            entry.last = Some(event.clone());
        }
        // An error only means nobody is subscribed right now.
        entry.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to `topic`. The retained event, if any, is delivered first.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let mut topics = self.lock();
        let entry = Self::topic_entry(&mut topics, topic, self.inner.capacity);
        Subscription {
            topic: topic.to_string(),
            replay: entry.last.clone(),
            receiver: entry.sender.subscribe(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// The retained event of `topic`.
    pub fn last(&self, topic: &str) -> Option<SyncEvent> {
        self.lock().get(topic).and_then(|t| t.last.clone())
    }

    /// Live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .get(topic)
            .map(|t| t.sender.receiver_count())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn topic_entry<'a>(
        topics: &'a mut HashMap<String, Topic>,
        topic: &str,
        capacity: usize,
    ) -> &'a mut Topic {
        topics.entry(topic.to_string()).or_insert_with(|| Topic {
            sender: broadcast::channel(capacity).0,
            last: None,
        })
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBus")
            .field("topics", &self.lock().len())
            .finish()
    }
}

/// A subscription to one topic.
pub struct Subscription {
    topic: String,
    replay: Option<SyncEvent>,
    receiver: broadcast::Receiver<SyncEvent>,
    seen: HashSet<Uuid>,
    seen_order: VecDeque<Uuid>,
}

impl Subscription {
    /// The subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next event, including repeats.
    ///
    /// A subscriber that falls behind skips the events it missed and keeps
    /// receiving; the retained-event replay and redelivery cover the gap.
    pub async fn recv(&mut self) -> Result<SyncEvent, FanoutError> {
        if let Some(event) = self.replay.take() {
            return Ok(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(_skipped)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(topic = %self.topic, skipped = _skipped, "subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(FanoutError::Closed),
            }
        }
    }

    /// Waits for the next event not already returned by this method.
    pub async fn recv_unique(&mut self) -> Result<SyncEvent, FanoutError> {
        loop {
            let event = self.recv().await?;
            if self.remember(event.event_id) {
                return Ok(event);
            }
        }
    }

    /// Returns an already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        if let Some(event) = self.replay.take() {
            return Some(event);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Records `id`; false if it was already seen.
    fn remember(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.seen_order.push_back(id);
        if self.seen_order.len() > SEEN_WINDOW {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("pending_replay", &self.replay.is_some())
            .finish()
    }
}
