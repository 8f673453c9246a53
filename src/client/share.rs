//! Producer client: watches a directory and publishes it to a session

use crate::client::http::SyncClient;
use crate::config::ClientConfig;
use crate::diff::{apply_changes, diff, ChangeKind, ChangeSet, Compactor, RawNotification};
use crate::error::{ApiError, ErrorCategory};
use crate::filter::{is_ignore_file, load_matcher, Matcher};
use crate::protocol::UpdateRequest;
use crate::tree::node::TreeNode;
use crate::tree::path::{canonicalize_root, TreePath};
use crate::tree::walker::{read_text, Walker, WalkerConfig};
use crate::types::SessionId;
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// What to share and under which session.
#[derive(Debug, Clone)]
pub struct ShareOptions {
    pub root: PathBuf,
    /// Name of a new session; defaults to the directory name
    pub name: Option<String>,
    /// Join and claim this existing session instead of creating one
    pub session: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSummary {
    pub session_id: SessionId,
    pub batches: usize,
    pub records: usize,
}

/// Groups watcher paths into batches.
///
/// A batch closes once no path arrived for `debounce`, once it has been open
/// for `debounce + window`, or once it holds `max_size` distinct paths. A
/// path reported several times appears once; its state is read from disk
/// when the batch is flushed, so the latest event wins.
#[derive(Debug, Clone)]
pub struct Batcher {
    debounce: Duration,
    window: Duration,
    max_size: usize,
}

impl Batcher {
    pub fn new(debounce: Duration, window: Duration, max_size: usize) -> Self {
        Self {
            debounce,
            window,
            max_size: max_size.max(1),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Duration::from_millis(config.debounce_ms),
            Duration::from_millis(config.batch_window_ms),
            config.max_batch_size,
        )
    }

    /// Wait for the next batch. `None` once the sender is gone and nothing
    /// is pending.
    pub async fn next_batch(
        &self,
        receiver: &mut mpsc::UnboundedReceiver<PathBuf>,
    ) -> Option<BTreeSet<PathBuf>> {
        let first = receiver.recv().await?;
        let mut batch = BTreeSet::from([first]);
        let hard_deadline = Instant::now() + self.debounce + self.window;

        while batch.len() < self.max_size {
            let deadline = (Instant::now() + self.debounce).min(hard_deadline);
            match timeout_at(deadline, receiver.recv()).await {
                Ok(Some(path)) => {
                    batch.insert(path);
                }
                Ok(None) | Err(_) => break,
            }
        }
        Some(batch)
    }
}

/// Owns a session and keeps it in step with a directory.
pub struct ShareDaemon {
    client: SyncClient,
    root: PathBuf,
    config: ClientConfig,
    max_file_size: u64,
    matcher: Arc<Matcher>,
    compactor: Compactor,
    live: TreeNode,
    session_id: SessionId,
    /// Set after a failed publish; the next flush sends the whole tree
    resync: bool,
}

impl ShareDaemon {
    /// Snapshot the directory, set up the session and publish the snapshot.
    pub async fn start(
        client: SyncClient,
        options: ShareOptions,
        config: ClientConfig,
        max_file_size: u64,
    ) -> Result<Self, ApiError> {
        let root = canonicalize_root(&options.root)?;
        if !root.is_dir() {
            return Err(ApiError::Validation(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let matcher = Arc::new(load_matcher(&root, &config.extra_ignore)?);
        let compactor = Compactor::new(matcher.clone(), config.transient_suffixes.clone());
        let live = snapshot_walker(&root, matcher.clone(), max_file_size).snapshot()?;

        let session_id = match options.session {
            Some(id) => {
                client.join_session(&id).await?;
                client.claim().await?;
                info!(session_id = %id, "Joined and claimed session");
                id
            }
            None => {
                let name = options.name.unwrap_or_else(|| default_session_name(&root));
                let created = client.create_session(&name).await?;
                info!(session_id = %created.session_id, name = %name, "Created session");
                created.session_id
            }
        };

        let response = client.publish(&UpdateRequest::Initial(live.clone())).await?;
        info!(
            session_id = %session_id,
            root = %root.display(),
            files = response.applied,
            "Published initial snapshot"
        );

        Ok(Self {
            client,
            root,
            config,
            max_file_size,
            matcher,
            compactor,
            live,
            session_id,
            resync: false,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The producer's view of the shared tree.
    pub fn tree(&self) -> &TreeNode {
        &self.live
    }

    /// Watch and publish until `shutdown` resolves, then leave the session.
    /// A publish the server refuses also ends the loop; the session is left
    /// before the error is returned.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ShareSummary, ApiError>
    where
        F: Future<Output = ()>,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
                Ok(event) => {
                    for path in event.paths {
                        let _ = sender.send(path);
                    }
                }
                Err(e) => warn!(error = %e, "File watcher error"),
            },
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!(root = %self.root.display(), "Watching for changes");

        let batcher = Batcher::from_config(&self.config);
        let mut summary = ShareSummary {
            session_id: self.session_id.clone(),
            batches: 0,
            records: 0,
        };

        let mut failure = None;
        tokio::pin!(shutdown);
        loop {
            let batch = tokio::select! {
                _ = &mut shutdown => break,
                batch = batcher.next_batch(&mut receiver) => batch,
            };
            let Some(paths) = batch else {
                break;
            };
            match self.flush(&paths).await {
                Ok(0) => {}
                Ok(records) => {
                    summary.batches += 1;
                    summary.records += records;
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Publish refused; stopping");
                    failure = Some(e);
                    break;
                }
            }
        }

        drop(watcher);
        match self.client.leave().await {
            Ok(_) => info!(session_id = %self.session_id, "Left session"),
            Err(e) => warn!(session_id = %self.session_id, error = %e, "Failed to leave session"),
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Turn a batch of changed paths into one publish. Returns the number of
    /// records the server applied.
    pub async fn flush(&mut self, paths: &BTreeSet<PathBuf>) -> Result<usize, ApiError> {
        let changes = if paths.iter().any(|p| is_ignore_file(&self.root, p)) {
            self.reload_ignore()?
        } else {
            self.compactor
                .compact(self.notifications(paths))
                .map(|tree| tree.flatten())
                .unwrap_or_default()
        };
        apply_changes(&mut self.live, &changes);

        let update = if self.resync {
            UpdateRequest::Initial(self.live.clone())
        } else if changes.is_empty() {
            return Ok(0);
        } else {
            UpdateRequest::Incremental(changes)
        };

        match self.client.publish(&update).await {
            Ok(response) => {
                self.resync = false;
                for skipped in &response.skipped {
                    warn!(path = %skipped.path, reason = %skipped.reason, "Server skipped file");
                }
                debug!(
                    session_id = %self.session_id,
                    applied = response.applied,
                    "Published batch"
                );
                Ok(response.applied)
            }
            Err(e) if e.category() == ErrorCategory::Internal => {
                warn!(error = %e, "Publish failed; the next batch resends the full tree");
                self.resync = true;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Recompile the ignore rules and diff the live tree against a fresh
    /// snapshot under them.
    fn reload_ignore(&mut self) -> Result<ChangeSet, ApiError> {
        let matcher = Arc::new(load_matcher(&self.root, &self.config.extra_ignore)?);
        info!(patterns = matcher.len(), "Ignore rules changed; rebuilding snapshot");
        self.matcher = matcher.clone();
        self.compactor.set_matcher(matcher);
        let rebuilt = snapshot_walker(&self.root, self.matcher.clone(), self.max_file_size)
            .snapshot()?;
        Ok(diff(&self.live, &rebuilt))
    }

    /// Read the current state of each path and compare it with the live tree.
    fn notifications(&self, paths: &BTreeSet<PathBuf>) -> Vec<RawNotification> {
        let walker = snapshot_walker(&self.root, self.matcher.clone(), self.max_file_size);
        paths
            .iter()
            .filter_map(|abs| self.notification_for(&walker, abs))
            .collect()
    }

    fn notification_for(&self, walker: &Walker, abs: &Path) -> Option<RawNotification> {
        let path = TreePath::from_relative(&self.root, abs)?;
        if path.is_root() {
            return None;
        }
        let existing = self.live.get(&path);
        let kind = if existing.is_some() {
            ChangeKind::Modified
        } else {
            ChangeKind::Created
        };

        let metadata = match fs::symlink_metadata(abs) {
            Ok(metadata) => metadata,
            Err(_) => {
                return existing.map(|node| RawNotification::deleted(path, node.is_dir()));
            }
        };

        if metadata.is_dir() {
            // Already known directories report their children individually
            if existing.map_or(false, TreeNode::is_dir) {
                return None;
            }
            match walker.snapshot_at(abs) {
                Ok(node) => Some(RawNotification::upsert(path, kind, node)),
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable directory");
                    None
                }
            }
        } else if metadata.is_file() {
            if metadata.len() > self.max_file_size {
                warn!(path = %path, size = metadata.len(), "Skipping file larger than the size limit");
                return None;
            }
            let content = match read_text(abs) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable file");
                    return None;
                }
            };
            if existing.and_then(TreeNode::content) == Some(content.as_str()) {
                return None;
            }
            Some(RawNotification::upsert(path, kind, TreeNode::file(content)))
        } else {
            None
        }
    }
}

fn snapshot_walker(root: &Path, matcher: Arc<Matcher>, max_file_size: u64) -> Walker {
    Walker::new(root.to_path_buf(), matcher).with_config(WalkerConfig {
        max_file_size: Some(max_file_size),
        ..WalkerConfig::default()
    })
}

fn default_session_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shared".to_string())
}
