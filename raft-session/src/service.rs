//! Collaborator interfaces a `SessionContext` consults but never owns the
//! implementation of: the surrounding state machine and the server it runs on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// What kind of entry is currently being applied on the service's executor, as
/// observed by a `SessionContext` mid-`publish` (spec §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Command,
    Query,
    Snapshot,
    None,
}

/// A handle to the single-threaded executor a session is pinned to.
///
/// Abstracts over "run this later, on the session's own executor" without
/// committing callers to a particular runtime primitive.
pub trait SessionExecutor: Send + Sync {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>);
}

/// The state machine a session belongs to. Queried by `SessionContext::publish`
/// to stamp outgoing event batches with the index and kind of the entry
/// currently being applied (spec §4.6).
pub trait ServiceContext: Send + Sync {
    /// Index of the Raft log entry currently being applied, or last applied if idle.
    fn current_index(&self) -> u64;

    /// What kind of entry is being applied right now.
    fn current_operation(&self) -> OperationKind;

    /// The executor the owning session is pinned to.
    fn executor(&self) -> Arc<dyn SessionExecutor>;

    fn service_type(&self) -> &str;

    fn service_name(&self) -> &str;
}

/// The server a session's `EventQueue` pushes through. Thin — a `SessionContext`
/// only needs to know whether it may push events right now, and how.
pub trait ServerContext<E: crate::AppEvent>: Send + Sync {
    /// Whether the local server believes itself to be the cluster leader.
    /// `EventQueue::send_events` is a no-op when this is false (spec §4.6).
    fn is_leader(&self) -> bool;

    fn protocol(&self) -> Arc<dyn crate::protocol::ServerProtocol<E>>;
}
