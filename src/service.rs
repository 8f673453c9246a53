//! Sync service: the registry, the hub and the per-client session directory
//!
//! Every HTTP handler goes through this facade. It owns no global state; the
//! server constructs one at startup and tears it down at shutdown.

use crate::broadcast::{BroadcastHub, Subscription};
use crate::error::ApiError;
use crate::protocol::api::{
    CreateSessionResponse, CurrentSessionResponse, JoinSessionResponse, PublishResponse,
    SkippedFile, SuccessResponse,
};
use crate::protocol::{BroadcastEnvelope, UpdateRequest};
use crate::session::{LeaveOutcome, SessionLimits, SessionRegistry, SessionStats, SessionSummary};
use crate::types::{ClientId, SessionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NOT_IN_SESSION: &str = "Not in a session";
const OWNER_ONLY: &str = "Only the session owner can publish";

pub struct SyncService {
    registry: Arc<SessionRegistry>,
    hub: BroadcastHub,
    /// Current session of each known client
    clients: RwLock<HashMap<ClientId, SessionId>>,
}

impl SyncService {
    pub fn new(registry: Arc<SessionRegistry>, hub: BroadcastHub) -> Self {
        Self {
            registry,
            hub,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_limits(limits: SessionLimits, subscriber_buffer: usize) -> Self {
        Self::new(
            Arc::new(SessionRegistry::new(limits)),
            BroadcastHub::new(subscriber_buffer),
        )
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.registry.list_sessions()
    }

    /// The client's current session, if it still exists. A stale entry is
    /// dropped on the way.
    pub fn current_session(&self, client: ClientId) -> Option<SessionId> {
        let id = self.clients.read().get(&client).cloned()?;
        if self.registry.exists(&id) {
            Some(id)
        } else {
            self.forget_client_if(client, &id);
            None
        }
    }

    fn forget_client_if(&self, client: ClientId, id: &SessionId) {
        let mut clients = self.clients.write();
        if clients.get(&client) == Some(id) {
            clients.remove(&client);
        }
    }

    fn require_session(&self, client: ClientId) -> Result<SessionId, ApiError> {
        self.current_session(client)
            .ok_or_else(|| ApiError::PermissionDenied(NOT_IN_SESSION.to_string()))
    }

    /// Create a session owned by `client`. A client already in a session
    /// leaves it first.
    pub fn create_session(
        &self,
        client: ClientId,
        name: Option<&str>,
    ) -> Result<CreateSessionResponse, ApiError> {
        let name = name.map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(ApiError::Validation("Session name is required".to_string()));
        }

        self.leave(client);
        let id = self.registry.create_session(name)?;
        self.registry.join_session(&id, client)?;
        self.registry.claim_session(&id, client)?;
        self.hub.open_session(&id);
        self.clients.write().insert(client, id.clone());

        info!(session_id = %id, client_id = %client, "Session created and claimed");
        Ok(CreateSessionResponse {
            session_id: id,
            success: true,
            is_owner: true,
        })
    }

    /// Join an existing session as a viewer (or rejoin as its owner).
    pub fn join_session(
        &self,
        client: ClientId,
        id: Option<SessionId>,
    ) -> Result<JoinSessionResponse, ApiError> {
        let id = id
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or_else(|| ApiError::Validation("Session ID is required".to_string()))?;

        let previous = self.current_session(client);
        let info = self.registry.join_session(&id, client)?;
        if let Some(previous) = previous.filter(|p| *p != id) {
            self.leave_session(client, &previous);
        }
        self.clients.write().insert(client, id.clone());

        debug!(session_id = %id, client_id = %client, "Client joined");
        Ok(JoinSessionResponse {
            success: true,
            session: info,
        })
    }

    /// Claim ownership of the client's current session.
    pub fn claim(&self, client: ClientId) -> Result<SuccessResponse, ApiError> {
        let id = self.require_session(client)?;
        self.registry.claim_session(&id, client)?;
        Ok(SuccessResponse::ok())
    }

    pub fn current(&self, client: ClientId) -> CurrentSessionResponse {
        let Some(id) = self.current_session(client) else {
            return CurrentSessionResponse::none();
        };
        match self.registry.get_session_stats(&id) {
            Ok(stats) => {
                CurrentSessionResponse::active(self.registry.is_owner(&id, client), stats)
            }
            Err(_) => {
                self.forget_client_if(client, &id);
                CurrentSessionResponse::none()
            }
        }
    }

    /// Leave the current session, if any. Always succeeds.
    pub fn leave(&self, client: ClientId) -> SuccessResponse {
        let previous = self.clients.write().remove(&client);
        if let Some(id) = previous {
            self.leave_session(client, &id);
        }
        SuccessResponse::ok()
    }

    fn leave_session(&self, client: ClientId, id: &SessionId) {
        match self.registry.leave_session(id, client) {
            LeaveOutcome::Closed { reason } => {
                info!(session_id = %id, reason = ?reason, "Closing broadcast channel");
                self.hub.close_session(id);
            }
            LeaveOutcome::Left { remaining } => {
                debug!(session_id = %id, client_id = %client, remaining, "Client left");
            }
            LeaveOutcome::NotFound => {}
        }
    }

    /// Account and broadcast a publish from the session owner.
    ///
    /// A snapshot that breaks any limit is rejected whole. In an incremental
    /// batch only the offending files are dropped; the rest goes out.
    pub fn publish(
        &self,
        client: ClientId,
        request: UpdateRequest,
    ) -> Result<PublishResponse, ApiError> {
        let id = self.require_session(client)?;
        if !self.registry.is_owner(&id, client) {
            return Err(ApiError::PermissionDenied(OWNER_ONLY.to_string()));
        }

        match request {
            UpdateRequest::Initial(tree) => {
                let report = self.registry.apply_snapshot(&id, &tree)?;
                let fan_out = self.hub.publish(BroadcastEnvelope::snapshot(id.clone(), tree));
                info!(
                    session_id = %id,
                    files = report.file_count,
                    bytes = report.total_size,
                    delivered = fan_out.delivered,
                    "Published snapshot"
                );
                Ok(PublishResponse {
                    success: true,
                    applied: report.file_count,
                    skipped: Vec::new(),
                })
            }
            UpdateRequest::Incremental(changes) => {
                let report = self.registry.apply_changes(&id, &changes)?;
                let skipped: Vec<SkippedFile> = report
                    .rejected
                    .iter()
                    .map(|r| SkippedFile {
                        path: r.path.to_string(),
                        reason: r.reason.to_string(),
                    })
                    .collect();

                if report.accepted.is_empty() {
                    if !skipped.is_empty() {
                        warn!(session_id = %id, skipped = skipped.len(), "Nothing left to publish");
                    }
                    return Ok(PublishResponse {
                        success: true,
                        applied: 0,
                        skipped,
                    });
                }

                let applied = report.accepted.len();
                let fan_out = self
                    .hub
                    .publish_patch(BroadcastEnvelope::changes(id.clone(), report.accepted));
                debug!(
                    session_id = %id,
                    records = applied,
                    skipped = skipped.len(),
                    delivered = fan_out.delivered,
                    dropped = fan_out.dropped,
                    "Published changes"
                );
                Ok(PublishResponse {
                    success: true,
                    applied,
                    skipped,
                })
            }
        }
    }

    /// Stats of the client's current session. Read failures fall back to
    /// zeroed usage with the configured limits.
    pub fn stats(&self, client: ClientId) -> Result<SessionStats, ApiError> {
        let id = self.require_session(client)?;
        Ok(match self.registry.get_session_stats(&id) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Falling back to default stats");
                SessionStats::unavailable(id, self.registry.limits())
            }
        })
    }

    /// Open a push channel on the client's current session. If patches went
    /// out since the last snapshot, the session tree is read back once and
    /// cached as the replay for later subscribers.
    pub fn subscribe(&self, client: ClientId) -> Result<Subscription, ApiError> {
        let id = self.require_session(client)?;
        let subscription = self.hub.add_subscriber_with(&id, || {
            self.registry
                .snapshot(&id)
                .ok()
                .map(|tree| BroadcastEnvelope::snapshot(id.clone(), tree))
        });
        subscription.ok_or_else(|| {
            self.forget_client_if(client, &id);
            ApiError::PermissionDenied(NOT_IN_SESSION.to_string())
        })
    }

    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Close every session and end every stream.
    pub fn shutdown(&self) {
        let closed = self.registry.clear();
        self.hub.close_all();
        self.clients.write().clear();
        info!(sessions = closed.len(), "Sync service shut down");
    }
}
