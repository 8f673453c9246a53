//! Session registry: lifecycle, membership, ownership and quota accounting

use crate::diff::{ChangeKind, ChangeRecord, ChangeSet};
use crate::error::{ApiError, QuotaError};
use crate::session::limits::SessionLimits;
use crate::tree::node::{EntryKind, TreeNode};
use crate::tree::path::TreePath;
use crate::types::{now, ClientId, SessionId, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accounting entry for one file in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub path: TreePath,
    pub size: u64,
    pub kind: EntryKind,
}

impl FileMeta {
    pub fn file(path: TreePath, size: u64) -> Self {
        Self {
            path,
            size,
            kind: EntryKind::File,
        }
    }
}

/// One live session.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub owner: Option<ClientId>,
    pub members: BTreeSet<ClientId>,
    pub files: BTreeMap<TreePath, FileMeta>,
    pub total_size: u64,
    pub created_at: Timestamp,
    /// Consolidated tree of everything accepted so far
    pub tree: TreeNode,
    /// Set once the session is deleted; holders of a stale handle must treat it as gone
    closed: bool,
}

/// Size and count effect of replacing the entry at a path.
struct Displacement {
    paths: Vec<TreePath>,
    size: u64,
}

impl Session {
    fn new(id: SessionId, name: String) -> Self {
        Self {
            id,
            name,
            owner: None,
            members: BTreeSet::new(),
            files: BTreeMap::new(),
            total_size: 0,
            created_at: now(),
            tree: TreeNode::empty_dir(),
            closed: false,
        }
    }

    /// Files that placing a node at `path` would overwrite: the path itself,
    /// anything beneath it, and ancestors that are currently files.
    fn displaced_by(&self, path: &TreePath) -> Displacement {
        let mut paths: Vec<TreePath> = path
            .ancestors()
            .filter(|a| self.files.contains_key(a))
            .collect();
        paths.extend(
            self.files
                .range(path.clone()..)
                .take_while(|(p, _)| p.starts_with(path))
                .map(|(p, _)| p.clone()),
        );
        let size = paths
            .iter()
            .filter_map(|p| self.files.get(p))
            .map(|m| m.size)
            .sum();
        Displacement { paths, size }
    }

    /// Check an upsert against the limits without mutating anything.
    fn check_file(&self, meta: &FileMeta, limits: &SessionLimits) -> Result<Displacement, QuotaError> {
        if meta.size > limits.max_file_size {
            return Err(QuotaError::FileTooLarge {
                path: meta.path.to_string(),
                size: meta.size,
                max: limits.max_file_size,
            });
        }

        let displaced = self.displaced_by(&meta.path);
        let is_new = !self.files.contains_key(&meta.path);
        if is_new && self.files.len() - displaced.paths.len() >= limits.max_files_per_session {
            return Err(QuotaError::TooManyFiles {
                max: limits.max_files_per_session,
            });
        }

        if self.total_size - displaced.size + meta.size > limits.max_session_size {
            return Err(QuotaError::SessionTooLarge {
                max: limits.max_session_size,
            });
        }
        Ok(displaced)
    }

    fn forget(&mut self, paths: &[TreePath]) {
        for path in paths {
            if let Some(old) = self.files.remove(path) {
                self.total_size -= old.size;
            }
        }
    }

    fn commit_file(&mut self, meta: FileMeta, displaced: Displacement) {
        self.forget(&displaced.paths);
        self.total_size += meta.size;
        self.files.insert(meta.path.clone(), meta);
    }

    /// Remove the entry at `path` (and everything beneath it). Returns bytes freed.
    fn remove_path(&mut self, path: &TreePath) -> u64 {
        let under: Vec<TreePath> = self
            .files
            .range(path.clone()..)
            .take_while(|(p, _)| p.starts_with(path))
            .map(|(p, _)| p.clone())
            .collect();
        let before = self.total_size;
        self.forget(&under);
        self.tree.remove(path);
        before - self.total_size
    }

    fn stats(&self, limits: &SessionLimits) -> SessionStats {
        SessionStats {
            id: self.id.clone(),
            name: self.name.clone(),
            file_count: self.files.len(),
            total_size: self.total_size,
            max_files: limits.max_files_per_session,
            max_size: limits.max_session_size,
            client_count: self.members.len(),
            has_owner: self.owner.is_some(),
        }
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            file_count: self.files.len(),
            total_size: self.total_size,
            created_at: self.created_at,
        }
    }
}

/// Usage and limits of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub id: SessionId,
    pub name: String,
    pub file_count: usize,
    pub total_size: u64,
    pub max_files: usize,
    pub max_size: u64,
    pub client_count: usize,
    pub has_owner: bool,
}

impl SessionStats {
    /// Zeroed usage with the configured limits, for when a session's stats
    /// cannot be read.
    pub fn unavailable(id: SessionId, limits: &SessionLimits) -> Self {
        Self {
            id,
            name: String::new(),
            file_count: 0,
            total_size: 0,
            max_files: limits.max_files_per_session,
            max_size: limits.max_session_size,
            client_count: 0,
            has_owner: false,
        }
    }
}

/// Listing entry for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub file_count: usize,
    pub total_size: u64,
    pub created_at: Timestamp,
}

/// Identity of a joined session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    OwnerLeft,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The session did not exist (already closed or never created)
    NotFound,
    /// The client left; the session lives on
    Left { remaining: usize },
    /// The client left and the session was deleted
    Closed { reason: CloseReason },
}

/// A file left out of an incremental batch because it broke a quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub path: TreePath,
    pub reason: QuotaError,
}

/// Result of accounting an incremental batch.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// The batch as accepted; a rejected file inside a directory payload keeps
    /// its previous content, or is pruned when it had none
    pub accepted: ChangeSet,
    pub rejected: Vec<RejectedFile>,
}

/// Result of accounting a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotReport {
    pub file_count: usize,
    pub total_size: u64,
}

/// All live sessions.
///
/// The map lock is held only to find or insert a session; each session has
/// its own mutex, so work on one session never waits on another. Lock order
/// is map then session, and the map write lock is never taken while a
/// session lock is held.
pub struct SessionRegistry {
    limits: SessionLimits,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn get(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>, ApiError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::SessionNotFound(id.clone()))
    }

    /// Run `f` with the session locked. Fails if the session is gone.
    fn with_session<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Session) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let handle = self.get(id)?;
        let mut session = handle.lock();
        if session.closed {
            return Err(ApiError::SessionNotFound(id.clone()));
        }
        f(&mut session)
    }

    /// Create an empty, unowned session.
    pub fn create_session(&self, name: &str) -> Result<SessionId, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Session name is required".to_string()));
        }

        let mut sessions = self.sessions.write();
        if sessions.len() >= self.limits.max_sessions {
            return Err(QuotaError::TooManySessions {
                max: self.limits.max_sessions,
            }
            .into());
        }

        let mut id = SessionId::generate();
        while sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        sessions.insert(
            id.clone(),
            Arc::new(Mutex::new(Session::new(id.clone(), name.to_string()))),
        );
        info!(session_id = %id, name, "Session created");
        Ok(id)
    }

    /// Add `client` to the session's members. Joining twice is harmless.
    pub fn join_session(&self, id: &SessionId, client: ClientId) -> Result<SessionInfo, ApiError> {
        self.with_session(id, |session| {
            if session.members.insert(client) {
                debug!(session_id = %id, client_id = %client, "Client joined session");
            }
            Ok(SessionInfo {
                id: session.id.clone(),
                name: session.name.clone(),
            })
        })
    }

    /// Make `client` the owner. Succeeds if the session is unowned or already
    /// owned by `client`.
    pub fn claim_session(&self, id: &SessionId, client: ClientId) -> Result<(), ApiError> {
        self.with_session(id, |session| match session.owner {
            Some(owner) if owner != client => Err(ApiError::OwnershipConflict(id.clone())),
            _ => {
                session.owner = Some(client);
                Ok(())
            }
        })
    }

    /// Remove `client` from the session. The session is deleted when its
    /// owner leaves or when nobody is left.
    pub fn leave_session(&self, id: &SessionId, client: ClientId) -> LeaveOutcome {
        let Ok(handle) = self.get(id) else {
            return LeaveOutcome::NotFound;
        };

        let outcome = {
            let mut session = handle.lock();
            if session.closed {
                return LeaveOutcome::NotFound;
            }
            session.members.remove(&client);
            let reason = if session.owner == Some(client) {
                session.owner = None;
                Some(CloseReason::OwnerLeft)
            } else if session.members.is_empty() {
                Some(CloseReason::Empty)
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    session.closed = true;
                    LeaveOutcome::Closed { reason }
                }
                None => LeaveOutcome::Left {
                    remaining: session.members.len(),
                },
            }
        };

        if let LeaveOutcome::Closed { reason } = &outcome {
            let mut sessions = self.sessions.write();
            if sessions.get(id).map_or(false, |h| Arc::ptr_eq(h, &handle)) {
                sessions.remove(id);
            }
            info!(session_id = %id, reason = ?reason, "Session closed");
        }
        outcome
    }

    /// Insert or replace one file, accounting its size.
    ///
    /// Fails without changing anything when the file is too large, the
    /// session would grow past its size cap, or a new file would exceed the
    /// file-count cap.
    pub fn update_file_in_session(
        &self,
        id: &SessionId,
        path: &TreePath,
        content: &str,
    ) -> Result<FileMeta, ApiError> {
        if path.is_root() || !path.is_safe() {
            return Err(ApiError::Validation(format!("Invalid file path: {}", path)));
        }
        let meta = FileMeta::file(path.clone(), content.len() as u64);
        let limits = &self.limits;
        self.with_session(id, |session| {
            let displaced = session.check_file(&meta, limits)?;
            session.commit_file(meta.clone(), displaced);
            session.tree.insert(path, TreeNode::file(content));
            Ok(meta)
        })
    }

    /// Remove a file or directory and release its accounted size. Returns
    /// the number of bytes freed.
    pub fn remove_file_from_session(&self, id: &SessionId, path: &TreePath) -> Result<u64, ApiError> {
        self.with_session(id, |session| Ok(session.remove_path(path)))
    }

    /// Replace the session's content with a full snapshot. Every limit is
    /// checked first; any violation rejects the whole snapshot.
    pub fn apply_snapshot(&self, id: &SessionId, tree: &TreeNode) -> Result<SnapshotReport, ApiError> {
        if !tree.is_dir() {
            return Err(ApiError::Validation(
                "Snapshot root must be a directory".to_string(),
            ));
        }
        if !tree.has_valid_names() {
            return Err(ApiError::Validation(
                "Snapshot contains an invalid name".to_string(),
            ));
        }

        let files = tree.files();
        let limits = &self.limits;
        let mut total: u64 = 0;
        for (path, content) in &files {
            let size = content.len() as u64;
            if size > limits.max_file_size {
                return Err(QuotaError::FileTooLarge {
                    path: path.to_string(),
                    size,
                    max: limits.max_file_size,
                }
                .into());
            }
            total += size;
        }
        if files.len() > limits.max_files_per_session {
            return Err(QuotaError::TooManyFiles {
                max: limits.max_files_per_session,
            }
            .into());
        }
        if total > limits.max_session_size {
            return Err(QuotaError::SessionTooLarge {
                max: limits.max_session_size,
            }
            .into());
        }

        let metas: BTreeMap<TreePath, FileMeta> = files
            .iter()
            .map(|(path, content)| (path.clone(), FileMeta::file(path.clone(), content.len() as u64)))
            .collect();
        let report = SnapshotReport {
            file_count: metas.len(),
            total_size: total,
        };

        self.with_session(id, |session| {
            session.files = metas;
            session.total_size = total;
            session.tree = tree.clone();
            Ok(())
        })?;
        debug!(session_id = %id, files = report.file_count, bytes = report.total_size, "Snapshot applied");
        Ok(report)
    }

    /// Account an incremental batch record by record. A file that breaks a
    /// quota is logged and skipped; everything else is applied.
    pub fn apply_changes(&self, id: &SessionId, changes: &ChangeSet) -> Result<ApplyReport, ApiError> {
        let limits = &self.limits;
        self.with_session(id, |session| {
            let mut report = ApplyReport::default();
            for record in changes.iter() {
                match (&record.kind, &record.payload) {
                    (ChangeKind::Deleted, _) => {
                        session.remove_path(&record.path);
                        report.accepted.push(record.clone());
                    }
                    (_, Some(TreeNode::File { content })) => {
                        let meta = FileMeta::file(record.path.clone(), content.len() as u64);
                        match session.check_file(&meta, limits) {
                            Ok(displaced) => {
                                session.commit_file(meta, displaced);
                                session.tree.insert(&record.path, TreeNode::file(content.as_str()));
                                report.accepted.push(record.clone());
                            }
                            Err(reason) => {
                                warn!(session_id = %id, path = %record.path, error = %reason, "Skipping file over quota");
                                report.rejected.push(RejectedFile {
                                    path: record.path.clone(),
                                    reason,
                                });
                            }
                        }
                    }
                    (_, Some(node @ TreeNode::Directory { .. })) => {
                        // Files the payload carries again are replaced one by one below,
                        // so a rejected replacement keeps its previous content.
                        let previous = session.tree.get(&record.path).cloned();
                        let incoming: BTreeSet<TreePath> = node
                            .files()
                            .into_iter()
                            .map(|(relative, _)| record.path.concat(&relative))
                            .collect();
                        let stale: Vec<TreePath> = session
                            .displaced_by(&record.path)
                            .paths
                            .into_iter()
                            .filter(|p| !incoming.contains(p))
                            .collect();
                        session.forget(&stale);

                        let mut accepted = node.clone();
                        for (relative, content) in node.files() {
                            let full = record.path.concat(&relative);
                            let meta = FileMeta::file(full.clone(), content.len() as u64);
                            match session.check_file(&meta, limits) {
                                Ok(displaced) => session.commit_file(meta, displaced),
                                Err(reason) => {
                                    warn!(session_id = %id, path = %full, error = %reason, "Skipping file over quota");
                                    let kept = previous
                                        .as_ref()
                                        .and_then(|p| p.get(&relative))
                                        .filter(|n| n.is_file())
                                        .cloned();
                                    match kept {
                                        Some(old) if session.files.contains_key(&full) => {
                                            accepted.insert(&relative, old);
                                        }
                                        _ => {
                                            session.forget(std::slice::from_ref(&full));
                                            accepted.remove(&relative);
                                        }
                                    }
                                    report.rejected.push(RejectedFile { path: full, reason });
                                }
                            }
                        }
                        session.tree.insert(&record.path, accepted.clone());
                        report.accepted.push(ChangeRecord {
                            path: record.path.clone(),
                            kind: record.kind,
                            payload: Some(accepted),
                        });
                    }
                    (_, None) => {
                        debug!(session_id = %id, path = %record.path, "Ignoring change without payload");
                    }
                }
            }
            Ok(report)
        })
    }

    pub fn get_session_stats(&self, id: &SessionId) -> Result<SessionStats, ApiError> {
        let limits = &self.limits;
        self.with_session(id, |session| Ok(session.stats(limits)))
    }

    /// All sessions, oldest first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let handles: Vec<Arc<Mutex<Session>>> = self.sessions.read().values().cloned().collect();
        let mut summaries: Vec<SessionSummary> = handles
            .iter()
            .filter_map(|h| {
                let session = h.lock();
                (!session.closed).then(|| session.summary())
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    pub fn exists(&self, id: &SessionId) -> bool {
        self.with_session(id, |_| Ok(())).is_ok()
    }

    pub fn is_owner(&self, id: &SessionId, client: ClientId) -> bool {
        self.with_session(id, |s| Ok(s.owner == Some(client)))
            .unwrap_or(false)
    }

    pub fn is_member(&self, id: &SessionId, client: ClientId) -> bool {
        self.with_session(id, |s| Ok(s.members.contains(&client)))
            .unwrap_or(false)
    }

    /// Copy of the session's consolidated tree.
    pub fn snapshot(&self, id: &SessionId) -> Result<TreeNode, ApiError> {
        self.with_session(id, |s| Ok(s.tree.clone()))
    }

    /// Name of a session, if it exists.
    pub fn session_name(&self, id: &SessionId) -> Option<String> {
        self.with_session(id, |s| Ok(s.name.clone())).ok()
    }

    /// Drop every session. Used at shutdown.
    pub fn clear(&self) -> Vec<SessionId> {
        let drained: Vec<(SessionId, Arc<Mutex<Session>>)> = self.sessions.write().drain().collect();
        drained
            .into_iter()
            .map(|(id, handle)| {
                handle.lock().closed = true;
                id
            })
            .collect()
    }
}
