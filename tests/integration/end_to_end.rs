//! Owner and viewers over a real server

use crate::integration::{file_at, write_files, TestServer};
use futures::StreamExt;
use mirrorcast::client::{EventStream, ShareDaemon, ShareOptions, SyncClient, ViewOptions, Viewer};
use mirrorcast::config::ClientConfig;
use mirrorcast::diff::ChangeKind;
use mirrorcast::error::ErrorCategory;
use mirrorcast::protocol::{EnvelopePayload, ServerEvent, UpdateRequest};
use mirrorcast::reconcile::Mirror;
use mirrorcast::session::SessionLimits;
use mirrorcast::tree::node::TreeNode;
use mirrorcast::tree::path::TreePath;
use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(events: &mut EventStream) -> ServerEvent {
    tokio::time::timeout(WAIT, events.next())
        .await
        .expect("timed out waiting for an event")
        .expect("stream ended")
        .expect("bad event")
}

async fn start_share(server: &TestServer, root: &TempDir) -> (SyncClient, ShareDaemon) {
    let owner = SyncClient::new(&server.url()).unwrap();
    let daemon = ShareDaemon::start(
        owner.clone(),
        ShareOptions {
            root: root.path().to_path_buf(),
            name: Some("Math Class".to_string()),
            session: None,
        },
        ClientConfig::default(),
        SessionLimits::default().max_file_size,
    )
    .await
    .unwrap();
    (owner, daemon)
}

fn classroom() -> TempDir {
    let root = TempDir::new().unwrap();
    write_files(
        root.path(),
        &[
            (".gitignore", "*.log\n"),
            ("main.py", "print('hello')\n"),
            ("lesson/notes.md", "# Fractions\n"),
            ("debug.log", "noise"),
        ],
    );
    root
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_viewer_follows_owner_edits() {
    let server = TestServer::start(SessionLimits::default()).await;
    let root = classroom();
    let (owner, mut daemon) = start_share(&server, &root).await;
    assert!(daemon.tree().get(&TreePath::parse("debug.log")).is_none());

    let student = SyncClient::new(&server.url()).unwrap();
    let sessions = student.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].name, "Math Class");

    student.join_session(daemon.session_id()).await.unwrap();
    let mut events = student.open_events().await.unwrap();
    let mut mirror = Mirror::new();

    assert_eq!(next_event(&mut events).await, ServerEvent::Connected);
    let ServerEvent::Update(snapshot) = next_event(&mut events).await else {
        panic!("expected the cached snapshot");
    };
    assert!(snapshot.is_initial());
    mirror.apply_envelope(&snapshot);
    assert_eq!(file_at(mirror.tree(), "main.py"), Some("print('hello')\n"));
    assert_eq!(file_at(mirror.tree(), "debug.log"), None);

    fs::write(root.path().join("main.py"), "print('fractions')\n").unwrap();
    fs::write(root.path().join("lesson/homework.md"), "1/2 + 1/4\n").unwrap();
    let touched: BTreeSet<_> = [
        daemon.root().join("main.py"),
        daemon.root().join("lesson/homework.md"),
        daemon.root().join("trace.log"),
    ]
    .into_iter()
    .collect();
    assert_eq!(daemon.flush(&touched).await.unwrap(), 2);

    let ServerEvent::Update(patch) = next_event(&mut events).await else {
        panic!("expected a patch");
    };
    let EnvelopePayload::Changes(changes) = &patch.payload else {
        panic!("expected incremental changes");
    };
    assert_eq!(changes.len(), 2);
    assert_eq!(
        changes.get(&TreePath::parse("main.py")).map(|r| r.kind),
        Some(ChangeKind::Modified)
    );
    assert_eq!(
        changes.get(&TreePath::parse("lesson/homework.md")).map(|r| r.kind),
        Some(ChangeKind::Created)
    );
    mirror.apply_envelope(&patch);
    assert_eq!(mirror.tree(), daemon.tree());

    fs::remove_file(root.path().join("lesson/notes.md")).unwrap();
    let removed: BTreeSet<_> = [daemon.root().join("lesson/notes.md")].into_iter().collect();
    daemon.flush(&removed).await.unwrap();
    let ServerEvent::Update(patch) = next_event(&mut events).await else {
        panic!("expected a deletion");
    };
    mirror.apply_envelope(&patch);
    assert_eq!(file_at(mirror.tree(), "lesson/notes.md"), None);
    assert_eq!(mirror.tree(), daemon.tree());

    let stats = student.stats().await.unwrap();
    assert_eq!(stats.file_count, 3);
    assert_eq!(stats.client_count, 2);

    let err = student
        .publish(&UpdateRequest::Initial(TreeNode::empty_dir()))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Permission);

    owner.leave().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ServerEvent::SessionClosed { .. }
    ));
    let end = tokio::time::timeout(WAIT, events.next()).await.unwrap();
    assert!(end.is_none());
    assert!(student.list_sessions().await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_viewer_materializes_until_session_closes() {
    let server = TestServer::start(SessionLimits::default()).await;
    let root = classroom();
    let (owner, mut daemon) = start_share(&server, &root).await;
    let session_id = daemon.session_id().clone();

    let out = TempDir::new().unwrap();
    let mut options = ViewOptions::new(session_id.clone());
    options.out = Some(out.path().join("mirror"));
    let viewer = Viewer::new(SyncClient::new(&server.url()).unwrap(), options).unwrap();
    let viewing = tokio::spawn(viewer.run(std::future::pending::<()>()));

    let hub_ready = async {
        while server.service.hub().subscriber_count(&session_id) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(WAIT, hub_ready).await.unwrap();

    fs::write(root.path().join("main.py"), "print('late edit')\n").unwrap();
    let touched: BTreeSet<_> = [daemon.root().join("main.py")].into_iter().collect();
    assert_eq!(daemon.flush(&touched).await.unwrap(), 1);
    owner.leave().await.unwrap();

    let summary = tokio::time::timeout(WAIT, viewing)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(summary.closed);
    assert_eq!(summary.files, 3);
    assert_eq!(
        fs::read_to_string(out.path().join("mirror/main.py")).unwrap(),
        "print('late edit')\n"
    );
    assert!(out.path().join("mirror/lesson/notes.md").is_file());
    assert!(!out.path().join("mirror/debug.log").exists());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refused_publish_stops_share_and_leaves() {
    let server = TestServer::start(SessionLimits::default()).await;
    let root = classroom();
    let (owner, daemon) = start_share(&server, &root).await;

    // Moving the owner's identity into another session makes it a viewer there,
    // so the daemon's next publish is refused with 403.
    let host = SyncClient::new(&server.url()).unwrap();
    let other = host.create_session("Other Class").await.unwrap().session_id;
    owner.join_session(&other).await.unwrap();
    assert_eq!(host.stats().await.unwrap().client_count, 2);

    let mut sharing = tokio::spawn(daemon.run(std::future::pending::<()>()));
    let outcome = tokio::time::timeout(WAIT, async {
        let mut edit = 0;
        loop {
            edit += 1;
            fs::write(root.path().join("main.py"), format!("print({})\n", edit)).unwrap();
            if let Ok(joined) = tokio::time::timeout(Duration::from_millis(200), &mut sharing).await {
                break joined.unwrap();
            }
        }
    })
    .await
    .unwrap();

    let err = outcome.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Permission);
    assert_eq!(host.stats().await.unwrap().client_count, 1);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_joining_an_unknown_session_fails() {
    let server = TestServer::start(SessionLimits::default()).await;
    let student = SyncClient::new(&server.url()).unwrap();
    let err = student
        .join_session(&"nope".into())
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert_eq!(student.health().await.unwrap().sessions, 0);
    server.stop().await;
}
