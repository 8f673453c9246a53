//! Producer edits travelling as envelopes into a viewer's mirror

use mirrorcast::diff::{apply_changes, diff};
use mirrorcast::protocol::{decode_event, BroadcastEnvelope, ServerEvent};
use mirrorcast::reconcile::{Materializer, Mirror};
use mirrorcast::tree::node::TreeNode;
use mirrorcast::tree::path::TreePath;
use mirrorcast::types::SessionId;
use std::fs;
use tempfile::TempDir;

fn lesson_v1() -> TreeNode {
    TreeNode::dir([
        ("README.md", TreeNode::file("# Lesson 1")),
        (
            "src",
            TreeNode::dir([
                ("main.py", TreeNode::file("print('hello')")),
                ("util.py", TreeNode::file("def add(a, b): return a + b")),
            ]),
        ),
    ])
}

fn lesson_v2() -> TreeNode {
    TreeNode::dir([
        ("README.md", TreeNode::file("# Lesson 1\n\nExercises below.")),
        (
            "src",
            TreeNode::dir([
                ("main.py", TreeNode::file("print('hello')")),
                ("exercise.py", TreeNode::file("# TODO: implement")),
            ]),
        ),
        ("data", TreeNode::dir([("input.txt", TreeNode::file("1 2 3"))])),
    ])
}

/// Send an envelope through its wire form, as the event stream does.
fn over_the_wire(envelope: BroadcastEnvelope) -> BroadcastEnvelope {
    let json = serde_json::to_string(&ServerEvent::Update(envelope)).unwrap();
    match decode_event(&json).unwrap() {
        ServerEvent::Update(envelope) => envelope,
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_patch_brings_mirror_to_producer_state() {
    let session = SessionId::from("lesson");
    let mut mirror = Mirror::new();
    mirror.apply_envelope(&over_the_wire(BroadcastEnvelope::snapshot(
        session.clone(),
        lesson_v1(),
    )));

    let changes = diff(&lesson_v1(), &lesson_v2());
    let outcome = mirror.apply_envelope(&over_the_wire(BroadcastEnvelope::changes(
        session, changes,
    )));
    assert!(!outcome.replaced);
    assert_eq!(mirror.tree(), &lesson_v2());
}

#[test]
fn test_producer_and_viewer_trees_stay_equal() {
    let mut producer = lesson_v1();
    let mut viewer = lesson_v1();

    let changes = diff(&producer, &lesson_v2());
    apply_changes(&mut producer, &changes);
    let json = serde_json::to_string(&changes).unwrap();
    apply_changes(&mut viewer, &serde_json::from_str(&json).unwrap());

    assert_eq!(producer, lesson_v2());
    assert_eq!(viewer, producer);
}

#[test]
fn test_snapshot_wire_shape() {
    let envelope = BroadcastEnvelope::snapshot(
        SessionId::from("s1"),
        TreeNode::dir([("a.py", TreeNode::file("x"))]),
    );
    let json = serde_json::to_value(ServerEvent::Update(envelope)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "type": "update",
            "sessionId": "s1",
            "isInitial": true,
            "content": {
                "kind": "directory",
                "children": { "a.py": { "kind": "file", "data": "x" } }
            }
        })
    );
}

#[test]
fn test_materialized_mirror_follows_patches() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("mirror");
    let mut materializer = Materializer::new(out.clone()).unwrap();
    let mut mirror = Mirror::new();

    mirror.replace(lesson_v1());
    materializer.sync(mirror.tree()).unwrap();
    assert!(out.join("src/util.py").is_file());

    mirror.apply(&diff(&lesson_v1(), &lesson_v2()));
    materializer.sync(mirror.tree()).unwrap();
    assert!(!out.join("src/util.py").exists());
    assert_eq!(fs::read_to_string(out.join("data/input.txt")).unwrap(), "1 2 3");
    assert_eq!(
        fs::read_to_string(out.join("README.md")).unwrap(),
        "# Lesson 1\n\nExercises below."
    );
    assert!(mirror.tree().get(&TreePath::parse("src/exercise.py")).is_some());
}
