//! Broadcast envelopes and the push-frame events that carry them

use crate::diff::ChangeSet;
use crate::tree::node::TreeNode;
use crate::types::SessionId;
use serde::{Deserialize, Serialize};

/// Content of one published unit of state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopePayload {
    /// Full tree; replaces whatever the receiver holds
    Snapshot(TreeNode),
    /// Patch against the receiver's current tree
    Changes(ChangeSet),
}

/// One published state for a session.
///
/// Serialized as `{"sessionId", "isInitial": true, "content"}` for snapshots
/// and `{"sessionId", "isInitial": false, "changes"}` for patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub struct BroadcastEnvelope {
    pub session_id: SessionId,
    pub payload: EnvelopePayload,
}

impl BroadcastEnvelope {
    pub fn snapshot(session_id: SessionId, tree: TreeNode) -> Self {
        Self {
            session_id,
            payload: EnvelopePayload::Snapshot(tree),
        }
    }

    pub fn changes(session_id: SessionId, changes: ChangeSet) -> Self {
        Self {
            session_id,
            payload: EnvelopePayload::Changes(changes),
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.payload, EnvelopePayload::Snapshot(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    session_id: SessionId,
    #[serde(default)]
    is_initial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    changes: Option<ChangeSet>,
}

impl TryFrom<WireEnvelope> for BroadcastEnvelope {
    type Error = String;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let payload = match (wire.is_initial, wire.content, wire.changes) {
            (true, Some(tree), _) => EnvelopePayload::Snapshot(tree),
            (false, _, Some(changes)) => EnvelopePayload::Changes(changes),
            (true, None, _) => return Err("Initial envelope is missing content".to_string()),
            (false, _, None) => return Err("Incremental envelope is missing changes".to_string()),
        };
        Ok(Self {
            session_id: wire.session_id,
            payload,
        })
    }
}

impl From<BroadcastEnvelope> for WireEnvelope {
    fn from(envelope: BroadcastEnvelope) -> Self {
        match envelope.payload {
            EnvelopePayload::Snapshot(tree) => WireEnvelope {
                session_id: envelope.session_id,
                is_initial: true,
                content: Some(tree),
                changes: None,
            },
            EnvelopePayload::Changes(changes) => WireEnvelope {
                session_id: envelope.session_id,
                is_initial: false,
                content: None,
                changes: Some(changes),
            },
        }
    }
}

/// Frames pushed on the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First frame of every stream
    Connected,
    Update(BroadcastEnvelope),
    /// The session was deleted; no further frames follow
    SessionClosed {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
}

/// Body of a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireUpdate", into = "WireUpdate")]
pub enum UpdateRequest {
    Initial(TreeNode),
    Incremental(ChangeSet),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUpdate {
    #[serde(default)]
    is_initial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    changes: Option<ChangeSet>,
}

impl TryFrom<WireUpdate> for UpdateRequest {
    type Error = String;

    fn try_from(wire: WireUpdate) -> Result<Self, Self::Error> {
        match (wire.is_initial, wire.content, wire.changes) {
            (true, Some(tree), _) => Ok(UpdateRequest::Initial(tree)),
            (true, None, _) => Err("content is required when isInitial is true".to_string()),
            (false, _, Some(changes)) => Ok(UpdateRequest::Incremental(changes)),
            (false, _, None) => Err("changes are required when isInitial is false".to_string()),
        }
    }
}

impl From<UpdateRequest> for WireUpdate {
    fn from(request: UpdateRequest) -> Self {
        match request {
            UpdateRequest::Initial(tree) => WireUpdate {
                is_initial: true,
                content: Some(tree),
                changes: None,
            },
            UpdateRequest::Incremental(changes) => WireUpdate {
                is_initial: false,
                content: None,
                changes: Some(changes),
            },
        }
    }
}
