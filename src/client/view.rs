//! Consumer client: follows a session into a local mirror

use crate::client::http::SyncClient;
use crate::error::{ApiError, ErrorCategory};
use crate::protocol::{BroadcastEnvelope, EnvelopePayload, ServerEvent};
use crate::reconcile::{Materializer, Mirror, ViewUpdate, ViewedFile};
use crate::tree::path::TreePath;
use crate::types::SessionId;
use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub session_id: SessionId,
    /// Write the mirror to this directory
    pub out: Option<PathBuf>,
    /// Print this file whenever its content changes
    pub follow: Option<TreePath>,
    /// Pause before reconnecting a dropped stream
    pub reconnect_delay: Duration,
}

impl ViewOptions {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            out: None,
            follow: None,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Whether the stream should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFlow {
    Continue,
    SessionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSummary {
    pub envelopes: usize,
    pub files: usize,
    /// The session ended (as opposed to a local shutdown)
    pub closed: bool,
}

pub struct Viewer {
    client: SyncClient,
    options: ViewOptions,
    mirror: Mirror,
    materializer: Option<Materializer>,
    envelopes: usize,
}

impl Viewer {
    pub fn new(client: SyncClient, options: ViewOptions) -> Result<Self, ApiError> {
        let materializer = options.out.clone().map(Materializer::new).transpose()?;
        Ok(Self {
            client,
            options,
            mirror: Mirror::new(),
            materializer,
            envelopes: 0,
        })
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Join the session and follow it until it closes or `shutdown` resolves.
    /// A dropped stream is reopened after the reconnect delay.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ViewSummary, ApiError>
    where
        F: Future<Output = ()>,
    {
        let session_id = self.options.session_id.clone();
        let joined = self.client.join_session(&session_id).await?;
        info!(session_id = %joined.session.id, name = %joined.session.name, "Joined session");

        tokio::pin!(shutdown);
        let mut reconnecting = false;
        let closed = 'session: loop {
            if reconnecting {
                tokio::select! {
                    _ = &mut shutdown => break 'session false,
                    _ = tokio::time::sleep(self.options.reconnect_delay) => {}
                }
                match self.client.join_session(&session_id).await {
                    Ok(_) => debug!(session_id = %session_id, "Rejoined session"),
                    Err(e) if e.category() == ErrorCategory::NotFound => {
                        info!(session_id = %session_id, "Session no longer exists");
                        break 'session true;
                    }
                    Err(e) => {
                        warn!(error = %e, "Reconnect failed");
                        continue;
                    }
                }
            }
            reconnecting = true;

            let mut events = match self.client.open_events().await {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "Failed to open event stream");
                    continue;
                }
            };

            loop {
                let next = tokio::select! {
                    _ = &mut shutdown => break 'session false,
                    next = events.next() => next,
                };
                match next {
                    Some(Ok(event)) => {
                        if self.handle_event(event)? == ViewFlow::SessionClosed {
                            break 'session true;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Event stream failed; reconnecting");
                        break;
                    }
                    None => {
                        warn!("Event stream ended; reconnecting");
                        break;
                    }
                }
            }
        };

        if !closed {
            if let Err(e) = self.client.leave().await {
                debug!(error = %e, "Failed to leave session");
            }
        }
        Ok(ViewSummary {
            envelopes: self.envelopes,
            files: self.mirror.tree().file_count(),
            closed,
        })
    }

    /// Apply one decoded event.
    pub fn handle_event(&mut self, event: ServerEvent) -> Result<ViewFlow, ApiError> {
        match event {
            ServerEvent::Connected => {
                debug!("Event stream connected");
                Ok(ViewFlow::Continue)
            }
            ServerEvent::SessionClosed { session_id } => {
                info!(session_id = %session_id, "Session closed");
                Ok(ViewFlow::SessionClosed)
            }
            ServerEvent::Update(envelope) => {
                self.apply(&envelope)?;
                Ok(ViewFlow::Continue)
            }
        }
    }

    fn apply(&mut self, envelope: &BroadcastEnvelope) -> Result<(), ApiError> {
        if envelope.session_id != self.options.session_id {
            warn!(session_id = %envelope.session_id, "Ignoring update for another session");
            return Ok(());
        }

        if let EnvelopePayload::Changes(changes) = &envelope.payload {
            for record in changes.iter() {
                info!(path = %record.path, kind = ?record.kind, "Changed");
            }
        }
        let outcome = self.mirror.apply_envelope(envelope);
        self.envelopes += 1;
        if outcome.replaced {
            info!(
                files = self.mirror.tree().file_count(),
                bytes = self.mirror.tree().total_size(),
                "Received snapshot"
            );
        }

        if let Some(materializer) = self.materializer.as_mut() {
            materializer.sync(self.mirror.tree())?;
        }
        self.update_follow(outcome.view);
        Ok(())
    }

    fn update_follow(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::Refreshed => {
                if let Some(viewed) = self.mirror.viewed() {
                    print_viewed(viewed);
                }
            }
            ViewUpdate::Cleared => warn!("Followed file was removed"),
            ViewUpdate::Unchanged => {}
        }

        if self.mirror.viewed().is_some() {
            return;
        }
        if let Some(path) = self.options.follow.clone() {
            if self.mirror.view(&path).is_some() {
                if let Some(viewed) = self.mirror.viewed() {
                    print_viewed(viewed);
                }
            }
        }
    }
}

fn print_viewed(viewed: &ViewedFile) {
    println!("==> {} <==", viewed.path);
    println!("{}", viewed.content);
}
