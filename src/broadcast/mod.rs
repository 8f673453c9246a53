//! Broadcast Hub
//!
//! Session-scoped pub/sub. Each session has its own channel holding the
//! latest envelope and the senders of its subscribers. Publishing replaces
//! the cached envelope and fans out to that session only; a new subscriber
//! gets the cached envelope before anything else. After a patch the cache
//! is marked stale and the next subscriber rebuilds it.
//!
//! Channels are opened explicitly when a session is created. Once closed a
//! channel stays closed: late publishes and subscribes are no-ops.
//!
//! Every subscriber has a bounded buffer. Delivery never waits: a subscriber
//! whose buffer is full, or whose receiver is gone, is dropped from the
//! channel and its stream ends.

use crate::protocol::BroadcastEnvelope;
use crate::types::SessionId;
use futures::Stream;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Default number of frames buffered per subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub enum HubFrame {
    Envelope(Arc<BroadcastEnvelope>),
    /// The session is gone; the stream ends after this frame
    SessionClosed(SessionId),
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers removed because they were full or disconnected
    pub dropped: usize,
}

/// What a new subscriber is sent first.
#[derive(Default)]
enum Replay {
    #[default]
    Nothing,
    Cached(Arc<BroadcastEnvelope>),
    /// Patches went out since the last full envelope
    Stale,
}

#[derive(Default)]
struct Channel {
    replay: Replay,
    subscribers: HashMap<u64, mpsc::Sender<HubFrame>>,
    closed: bool,
}

struct HubInner {
    channels: RwLock<HashMap<SessionId, Arc<Mutex<Channel>>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl HubInner {
    fn channel(&self, session_id: &SessionId) -> Option<Arc<Mutex<Channel>>> {
        self.channels.read().get(session_id).cloned()
    }

    fn remove(&self, session_id: &SessionId, subscriber_id: u64) -> bool {
        match self.channel(session_id) {
            Some(channel) => channel.lock().subscribers.remove(&subscriber_id).is_some(),
            None => false,
        }
    }
}

/// Cloneable handle to the hub.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Open the channel for a new session. Opening twice is harmless.
    pub fn open_session(&self, session_id: &SessionId) {
        self.inner
            .channels
            .write()
            .entry(session_id.clone())
            .or_default();
        debug!(session_id = %session_id, "Broadcast channel opened");
    }

    /// Register a subscriber for `session_id`. If the session has a cached
    /// envelope it is queued for this subscriber before any later publish.
    /// Returns `None` when the session has no open channel.
    pub fn add_subscriber(&self, session_id: &SessionId) -> Option<Subscription> {
        self.add_subscriber_with(session_id, || None)
    }

    /// Like [`add_subscriber`](Self::add_subscriber), but a stale cache is
    /// replaced by the envelope `rebuild` returns before it is queued.
    pub fn add_subscriber_with<F>(&self, session_id: &SessionId, rebuild: F) -> Option<Subscription>
    where
        F: FnOnce() -> Option<BroadcastEnvelope>,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.buffer);

        let channel = self.inner.channel(session_id)?;
        {
            let mut channel = channel.lock();
            if channel.closed {
                return None;
            }
            if matches!(channel.replay, Replay::Stale) {
                channel.replay = match rebuild() {
                    Some(envelope) => Replay::Cached(Arc::new(envelope)),
                    None => Replay::Stale,
                };
            }
            if let Replay::Cached(latest) = &channel.replay {
                // The buffer is empty and at least one slot long, so this cannot fail.
                let _ = sender.try_send(HubFrame::Envelope(latest.clone()));
            }
            channel.subscribers.insert(id, sender);
        }
        debug!(session_id = %session_id, subscriber_id = id, "Subscriber added");

        Some(Subscription {
            id,
            session_id: session_id.clone(),
            receiver,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// Deregister a subscriber. Removing an unknown subscriber does nothing.
    pub fn remove_subscriber(&self, session_id: &SessionId, subscriber_id: u64) -> bool {
        let removed = self.inner.remove(session_id, subscriber_id);
        if removed {
            debug!(session_id = %session_id, subscriber_id, "Subscriber removed");
        }
        removed
    }

    /// Cache `envelope` as the session's latest state and deliver it to the
    /// session's subscribers.
    pub fn publish(&self, envelope: BroadcastEnvelope) -> PublishReport {
        let envelope = Arc::new(envelope);
        self.fan_out(envelope.clone(), Replay::Cached(envelope))
    }

    /// Deliver a patch to current subscribers and mark the cache stale, so
    /// the next subscriber gets a rebuilt full envelope instead.
    pub fn publish_patch(&self, patch: BroadcastEnvelope) -> PublishReport {
        self.fan_out(Arc::new(patch), Replay::Stale)
    }

    fn fan_out(&self, live: Arc<BroadcastEnvelope>, replay: Replay) -> PublishReport {
        let session_id = live.session_id.clone();
        let mut report = PublishReport::default();
        let Some(channel) = self.inner.channel(&session_id) else {
            debug!(session_id = %session_id, "No open channel; nothing published");
            return report;
        };
        let mut channel = channel.lock();
        if channel.closed {
            debug!(session_id = %session_id, "Channel closed; nothing published");
            return report;
        }
        channel.replay = replay;

        channel.subscribers.retain(|id, sender| {
            match sender.try_send(HubFrame::Envelope(live.clone())) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %session_id, subscriber_id = id, "Subscriber buffer full; disconnecting");
                    report.dropped += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session_id = %session_id, subscriber_id = id, "Subscriber gone");
                    report.dropped += 1;
                    false
                }
            }
        });
        report
    }

    /// The cached envelope for a session, if any. A stale cache reads as none.
    pub fn latest(&self, session_id: &SessionId) -> Option<Arc<BroadcastEnvelope>> {
        let channel = self.inner.channel(session_id)?;
        let channel = channel.lock();
        match &channel.replay {
            Replay::Cached(envelope) => Some(envelope.clone()),
            Replay::Nothing | Replay::Stale => None,
        }
    }

    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.inner
            .channel(session_id)
            .map_or(0, |channel| channel.lock().subscribers.len())
    }

    /// Forget a session: drop its cache and end every subscriber's stream
    /// after a final close frame.
    pub fn close_session(&self, session_id: &SessionId) {
        let Some(channel) = self.inner.channels.write().remove(session_id) else {
            return;
        };
        let mut channel = channel.lock();
        channel.closed = true;
        for (_, sender) in channel.subscribers.drain() {
            let _ = sender.try_send(HubFrame::SessionClosed(session_id.clone()));
        }
        channel.replay = Replay::Nothing;
        debug!(session_id = %session_id, "Broadcast channel closed");
    }

    /// Close every channel. Used at shutdown.
    pub fn close_all(&self) {
        let ids: Vec<SessionId> = self.inner.channels.read().keys().cloned().collect();
        for id in ids {
            self.close_session(&id);
        }
    }
}

/// A live subscription. Dropping it deregisters the subscriber.
pub struct Subscription {
    id: u64,
    session_id: SessionId,
    receiver: mpsc::Receiver<HubFrame>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Next frame, or `None` once the subscriber has been dropped by the hub.
    pub async fn recv(&mut self) -> Option<HubFrame> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<HubFrame> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = HubFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            inner.remove(&self.session_id, self.id);
        }
    }
}
