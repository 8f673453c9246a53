//! Session-scoped fan-out through the sync service

use mirrorcast::broadcast::HubFrame;
use mirrorcast::diff::{ChangeRecord, ChangeSet};
use mirrorcast::protocol::{EnvelopePayload, UpdateRequest};
use mirrorcast::service::SyncService;
use mirrorcast::session::SessionLimits;
use mirrorcast::tree::node::TreeNode;
use mirrorcast::tree::path::TreePath;
use mirrorcast::types::ClientId;

fn payload(frame: HubFrame) -> EnvelopePayload {
    match frame {
        HubFrame::Envelope(envelope) => envelope.payload.clone(),
        other => panic!("unexpected frame {:?}", other),
    }
}

#[test]
fn test_two_classrooms_do_not_see_each_other() {
    let service = SyncService::with_limits(SessionLimits::default(), 16);
    let (owner_a, owner_b) = (ClientId::new(), ClientId::new());
    let (student_a, student_b) = (ClientId::new(), ClientId::new());

    let a = service.create_session(owner_a, Some("Room A")).unwrap().session_id;
    let b = service.create_session(owner_b, Some("Room B")).unwrap().session_id;
    service.join_session(student_a, Some(a.clone())).unwrap();
    service.join_session(student_b, Some(b.clone())).unwrap();

    let mut sub_a = service.subscribe(student_a).unwrap();
    let mut sub_b = service.subscribe(student_b).unwrap();

    service
        .publish(
            owner_a,
            UpdateRequest::Initial(TreeNode::dir([("a.py", TreeNode::file("room a"))])),
        )
        .unwrap();

    match payload(sub_a.try_recv().unwrap()) {
        EnvelopePayload::Snapshot(tree) => {
            assert_eq!(tree.get(&TreePath::parse("a.py")).and_then(TreeNode::content), Some("room a"))
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
    assert!(sub_b.try_recv().is_none());
    assert!(service.hub().latest(&b).is_none());
}

#[test]
fn test_late_joiner_receives_current_tree_after_patches() {
    let service = SyncService::with_limits(SessionLimits::default(), 16);
    let owner = ClientId::new();
    let id = service.create_session(owner, Some("Math Class")).unwrap().session_id;

    service
        .publish(
            owner,
            UpdateRequest::Initial(TreeNode::dir([("a.py", TreeNode::file("v1"))])),
        )
        .unwrap();
    for n in 2..=4 {
        let mut changes = ChangeSet::new();
        changes.push(ChangeRecord::modified(
            TreePath::parse("a.py"),
            TreeNode::file(format!("v{}", n)),
        ));
        changes.push(ChangeRecord::created(
            TreePath::parse(&format!("step{}.txt", n)),
            TreeNode::file("done"),
        ));
        service.publish(owner, UpdateRequest::Incremental(changes)).unwrap();
    }

    let late = ClientId::new();
    service.join_session(late, Some(id)).unwrap();
    let mut subscription = service.subscribe(late).unwrap();

    match payload(subscription.try_recv().unwrap()) {
        EnvelopePayload::Snapshot(tree) => {
            assert_eq!(tree.get(&TreePath::parse("a.py")).and_then(TreeNode::content), Some("v4"));
            assert_eq!(tree.file_count(), 4);
        }
        other => panic!("expected snapshot replay, got {:?}", other),
    }
    assert!(subscription.try_recv().is_none());
}

#[tokio::test]
async fn test_session_close_reaches_viewers() {
    let service = SyncService::with_limits(SessionLimits::default(), 16);
    let owner = ClientId::new();
    let viewer = ClientId::new();
    let id = service.create_session(owner, Some("Short")).unwrap().session_id;
    service.join_session(viewer, Some(id.clone())).unwrap();
    let mut subscription = service.subscribe(viewer).unwrap();

    service.leave(owner);

    match subscription.recv().await {
        Some(HubFrame::SessionClosed(closed)) => assert_eq!(closed, id),
        other => panic!("expected close frame, got {:?}", other),
    }
    assert!(subscription.recv().await.is_none());
    assert!(!service.current(viewer).in_session);
}
