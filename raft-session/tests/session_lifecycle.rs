//! Happy-path open + command + ack, and the terminal close transition
//! (spec §8 scenario 1).

mod fixtures;

use std::sync::Arc;

use fixtures::TestOp;
use pretty_assertions::assert_eq;
use raft_session::client::requests::CloseSessionRequest;
use raft_session::{SessionId, SessionListener, SessionState};

struct RecordingListener {
    transitions: std::sync::Mutex<Vec<SessionState>>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            transitions: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<SessionState> {
        self.transitions.lock().unwrap().clone()
    }
}

impl SessionListener for RecordingListener {
    fn on_state_change(&self, _session: SessionId, state: SessionState) {
        self.transitions.lock().unwrap().push(state);
    }
}

#[tokio::test]
async fn open_command_and_ack_advance_session_state() {
    let cluster = fixtures::build_cluster(&[1], 1);
    let connection = fixtures::build_connection(cluster.clone(), 1, &[1]);
    let node = cluster.node(1).unwrap();

    let session_id = fixtures::open_session(&connection).await;

    let listener = RecordingListener::new();
    node.with_session(session_id, |ctx| ctx.add_listener(listener.clone()));

    let response = connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("A".into())))
        .await
        .expect("command should succeed")
        .expect("command should return a response");
    assert_eq!(response.result, "A");

    let (command_sequence, last_applied, request_sequence) = node
        .with_session(session_id, |ctx| (ctx.command_sequence(), ctx.last_applied(), ctx.request_sequence()))
        .unwrap();
    assert_eq!(command_sequence, 1);
    assert_eq!(last_applied, response.index);
    assert_eq!(request_sequence, 1, "the command's request sequence advances the high-water mark");

    // clearResults (exercised through the same path a keep-alive ack uses):
    // the low-water mark advances and a retransmission of seq=1 is no longer
    // answerable from cache.
    node.with_session(session_id, |ctx| ctx.clear_results(1));
    let retransmit = connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("A".into())))
        .await;
    assert!(matches!(
        retransmit,
        Err(raft_session::SessionError::Application(raft_session::ApplicationErrorKind::CommandFailure))
    ));

    assert!(listener.seen().is_empty(), "no transition has happened yet");

    connection
        .close_session(CloseSessionRequest { session_id })
        .await
        .expect("close_session should succeed");
    assert_eq!(node.session_state(session_id), Some(SessionState::Closed));
    assert_eq!(listener.seen(), vec![SessionState::Closed]);

    // A second close is a no-op: no duplicate notification.
    node.with_session(session_id, |ctx| ctx.close());
    assert_eq!(listener.seen(), vec![SessionState::Closed]);
}

#[tokio::test]
async fn duplicate_command_before_gc_returns_cached_result_without_reapplying() {
    let (cluster, machine) = fixtures::build_cluster_with_state_machine(&[1], 1);
    let connection = fixtures::build_connection(cluster.clone(), 1, &[1]);

    let session_id = fixtures::open_session(&connection).await;

    let first = connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("A".into())))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.result, "A");
    assert_eq!(machine.apply_count(), 1);

    let retransmit = connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("A".into())))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retransmit.result, "A");
    assert_eq!(machine.apply_count(), 1, "a cached retransmission must not re-apply");
}
