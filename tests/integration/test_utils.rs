//! Shared test utilities for integration tests

use mirrorcast::config::ServerConfig;
use mirrorcast::server;
use mirrorcast::service::SyncService;
use mirrorcast::session::SessionLimits;
use mirrorcast::tree::node::TreeNode;
use mirrorcast::tree::path::TreePath;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Serializes tests that touch process environment variables
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Write `files` (path, content) under `root`, creating parents.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(target, content).unwrap();
    }
}

pub fn file_at<'a>(tree: &'a TreeNode, path: &str) -> Option<&'a str> {
    tree.get(&TreePath::parse(path)).and_then(TreeNode::content)
}

/// A server on an ephemeral port, stopped when dropped or shut down.
pub struct TestServer {
    pub addr: SocketAddr,
    pub service: Arc<SyncService>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(limits: SessionLimits) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig::default();
        let service = Arc::new(SyncService::with_limits(limits, config.subscriber_buffer));
        let (tx, rx) = oneshot::channel::<()>();

        let server_service = service.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            server::serve_on(listener, server_service, &config, shutdown)
                .await
                .unwrap();
        });

        Self {
            addr,
            service,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
