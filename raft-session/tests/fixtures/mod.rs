//! Shared harness for `raft-session`'s integration tests: an in-memory
//! cluster, a trivial state machine, and the glue to wire a `ClientConnection`
//! to it. Mirrors the teacher's `tests/fixtures/mod.rs` role for
//! `RaftRouter`/`MemStore`.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use raft_session::client::requests::{CommandRequest, OpenSessionRequest, QueryRequest, ReadConsistency};
use raft_session::{ClientConnection, Config, MemberId, SessionContext, SessionId};
use raft_session_harness::{MemoryCluster, MemoryNode, StateMachine};

/// The operation payload this fixture's state machine understands.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum TestOp {
    /// Apply/query: echo `value` back as the result.
    Echo(String),
    /// Apply only: echo `value` back, and publish each of `events` to the
    /// session mid-application (spec §4.6).
    EchoAndEmit { value: String, events: Vec<String> },
}

pub type TestResult = String;
pub type TestEvent = String;

/// Echoes `value` back as the result, optionally publishing events, and counts
/// every `apply` call so tests can assert a command was applied at most once
/// (spec §8 P5).
#[derive(Default)]
pub struct EchoStateMachine {
    applies: AtomicUsize,
}

impl EchoStateMachine {
    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

impl StateMachine<TestOp, TestResult, TestEvent> for EchoStateMachine {
    fn apply(&self, operation: &TestOp, session: &mut SessionContext<TestOp, TestResult, TestEvent>) -> TestResult {
        self.applies.fetch_add(1, Ordering::SeqCst);
        match operation {
            TestOp::Echo(value) => value.clone(),
            TestOp::EchoAndEmit { value, events } => {
                for event in events {
                    session.publish(event.clone()).expect("publish during command application");
                }
                value.clone()
            }
        }
    }

    fn query(&self, operation: &TestOp) -> TestResult {
        match operation {
            TestOp::Echo(value) => value.clone(),
            TestOp::EchoAndEmit { value, .. } => value.clone(),
        }
    }
}

pub type TestCluster = MemoryCluster<TestOp, TestResult, TestEvent>;
pub type TestNode = MemoryNode<TestOp, TestResult, TestEvent>;
pub type TestConnection = ClientConnection<TestOp, TestResult>;

/// Build a simulated cluster with `member_ids` sharing one backend (spec.md's
/// consensus oracle guarantees they'd converge on the same state anyway), and
/// leadership pinned to `leader`.
pub fn build_cluster(member_ids: &[MemberId], leader: MemberId) -> Arc<TestCluster> {
    let (cluster, _machine) = build_cluster_with_state_machine(member_ids, leader);
    cluster
}

/// Like `build_cluster`, but hands back the shared state machine so tests can
/// assert on `apply_count()` (spec §8 P5).
pub fn build_cluster_with_state_machine(
    member_ids: &[MemberId],
    leader: MemberId,
) -> (Arc<TestCluster>, Arc<EchoStateMachine>) {
    let machine = Arc::new(EchoStateMachine::default());
    let cluster = TestCluster::new("test-service", "default", machine.clone());
    for &id in member_ids {
        cluster.add_node(id);
    }
    cluster.set_leader(leader);
    (cluster, machine)
}

/// Build a `ClientConnection` dispatching through `cluster`, hinted at `leader`.
pub fn build_connection(cluster: Arc<TestCluster>, leader: MemberId, member_ids: &[MemberId]) -> TestConnection {
    let config = Arc::new(Config::build("test".into()).validate().expect("valid config"));
    ClientConnection::new(config, cluster, Some(leader), member_ids.to_vec())
}

/// Open a session through `connection` and return its assigned id.
pub async fn open_session(connection: &TestConnection) -> SessionId {
    connection
        .open_session(OpenSessionRequest {
            service_type: "test-service".into(),
            service_name: "default".into(),
            timeout_millis: 10_000,
        })
        .await
        .expect("open_session should succeed")
        .expect("open_session should return a response")
        .session_id
}

pub fn command_request(session_id: SessionId, sequence: u64, operation: TestOp) -> CommandRequest<TestOp> {
    CommandRequest {
        session_id,
        sequence,
        operation,
    }
}

/// Yield to the runtime a handful of times so a `SessionExecutor::spawn`ed
/// publish task (fired fire-and-forget from inside command application, per
/// spec §4.6) gets a chance to run before a test inspects its side effects.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn query_request(
    session_id: SessionId,
    sequence: u64,
    index: u64,
    consistency: ReadConsistency,
    operation: TestOp,
) -> QueryRequest<TestOp> {
    QueryRequest {
        session_id,
        sequence,
        index,
        consistency,
        operation,
    }
}
