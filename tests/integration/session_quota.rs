//! Quota enforcement at the publish boundary

use mirrorcast::diff::{ChangeRecord, ChangeSet};
use mirrorcast::error::{ApiError, QuotaError};
use mirrorcast::protocol::{EnvelopePayload, UpdateRequest};
use mirrorcast::service::SyncService;
use mirrorcast::session::SessionLimits;
use mirrorcast::tree::node::TreeNode;
use mirrorcast::tree::path::TreePath;
use mirrorcast::types::ClientId;

fn small_limits() -> SessionLimits {
    SessionLimits {
        max_sessions: 2,
        max_files_per_session: 3,
        max_file_size: 10,
        max_session_size: 20,
    }
}

#[test]
fn test_session_cap_names_the_limit() {
    let service = SyncService::with_limits(small_limits(), 8);
    service.create_session(ClientId::new(), Some("one")).unwrap();
    service.create_session(ClientId::new(), Some("two")).unwrap();

    let err = service
        .create_session(ClientId::new(), Some("three"))
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::QuotaExceeded(QuotaError::TooManySessions { max: 2 })
    ));
    assert_eq!(err.to_string(), "Maximum number of sessions (2) reached");
    assert_eq!(service.session_count(), 2);
}

#[test]
fn test_oversize_snapshot_is_rejected_whole() {
    let service = SyncService::with_limits(small_limits(), 8);
    let owner = ClientId::new();
    let id = service.create_session(owner, Some("big")).unwrap().session_id;

    let tree = TreeNode::dir([
        ("ok.txt", TreeNode::file("small")),
        ("big.txt", TreeNode::file("this is far too large")),
    ]);
    let err = service.publish(owner, UpdateRequest::Initial(tree)).unwrap_err();
    assert!(matches!(
        err,
        ApiError::QuotaExceeded(QuotaError::FileTooLarge { .. })
    ));

    let stats = service.stats(owner).unwrap();
    assert_eq!(stats.file_count, 0);
    assert_eq!(stats.total_size, 0);
    assert!(service.hub().latest(&id).is_none());
}

#[test]
fn test_incremental_batch_publishes_only_accepted_files() {
    let service = SyncService::with_limits(small_limits(), 8);
    let owner = ClientId::new();
    let viewer = ClientId::new();
    let id = service.create_session(owner, Some("mixed")).unwrap().session_id;
    service.join_session(viewer, Some(id)).unwrap();
    let mut subscription = service.subscribe(viewer).unwrap();

    let mut changes = ChangeSet::new();
    changes.push(ChangeRecord::created(TreePath::parse("a.txt"), TreeNode::file("aaaa")));
    changes.push(ChangeRecord::created(
        TreePath::parse("huge.txt"),
        TreeNode::file("0123456789abcdef"),
    ));
    changes.push(ChangeRecord::created(
        TreePath::parse("docs"),
        TreeNode::dir([
            ("fits.md", TreeNode::file("12345")),
            ("nope.md", TreeNode::file("far too long here")),
        ]),
    ));

    let response = service
        .publish(owner, UpdateRequest::Incremental(changes))
        .unwrap();
    let mut skipped: Vec<&str> = response.skipped.iter().map(|s| s.path.as_str()).collect();
    skipped.sort();
    assert_eq!(skipped, vec!["docs/nope.md", "huge.txt"]);

    let stats = service.stats(owner).unwrap();
    assert_eq!(stats.file_count, 2);
    assert_eq!(stats.total_size, 9);

    let frame = subscription.try_recv().unwrap();
    let envelope = match frame {
        mirrorcast::broadcast::HubFrame::Envelope(envelope) => envelope,
        other => panic!("unexpected frame {:?}", other),
    };
    let EnvelopePayload::Changes(sent) = &envelope.payload else {
        panic!("expected a patch");
    };
    assert!(sent.get(&TreePath::parse("huge.txt")).is_none());
    let docs = sent
        .get(&TreePath::parse("docs"))
        .and_then(|r| r.payload.as_ref())
        .unwrap();
    assert!(docs.get(&TreePath::parse("fits.md")).is_some());
    assert!(docs.get(&TreePath::parse("nope.md")).is_none());
}

#[test]
fn test_file_count_cap_applies_to_new_files_only() {
    let service = SyncService::with_limits(small_limits(), 8);
    let owner = ClientId::new();
    service.create_session(owner, Some("count")).unwrap();
    service
        .publish(
            owner,
            UpdateRequest::Initial(TreeNode::dir([
                ("1", TreeNode::file("a")),
                ("2", TreeNode::file("b")),
                ("3", TreeNode::file("c")),
            ])),
        )
        .unwrap();

    let mut changes = ChangeSet::new();
    changes.push(ChangeRecord::modified(TreePath::parse("1"), TreeNode::file("updated")));
    changes.push(ChangeRecord::created(TreePath::parse("4"), TreeNode::file("d")));
    let response = service
        .publish(owner, UpdateRequest::Incremental(changes))
        .unwrap();

    assert_eq!(response.applied, 1);
    assert_eq!(response.skipped.len(), 1);
    assert_eq!(response.skipped[0].path, "4");
    assert_eq!(response.skipped[0].reason, "Maximum files per session (3) reached");
}
