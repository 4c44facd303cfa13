//! An in-memory implementation of `raft-session`'s collaborator traits, for
//! exercising `ClientConnection`/`SessionContext` without a real transport or
//! consensus layer, in the spirit of `memstore`'s relationship to
//! `RaftStorage`.
//!
//! A simulated cluster shares one replicated backend (`Shared`) across every
//! member: spec.md treats log replication as an oracle, so this harness
//! models its guarantee directly — every member observes the same applied
//! session state — rather than re-implementing consensus to produce it.
//! `MemoryNode` only adds the per-member facets that really do vary node to
//! node: whether this member currently believes itself leader, and whether
//! the simulated network can reach it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;

use raft_session::client::requests::{
    CloseSessionRequest, CloseSessionResponse, CommandRequest, CommandResponse, KeepAliveRequest,
    KeepAliveResponse, MetadataRequest, MetadataResponse, OpenSessionRequest, OpenSessionResponse,
    QueryRequest, QueryResponse, ReadConsistency, ResetRequest,
};
use raft_session::error::{ApplicationErrorKind, TransportError};
use raft_session::protocol::{ClientProtocol, PublishRequest, ResetHandler, ServerProtocol, Status};
use raft_session::service::{OperationKind, ServerContext, ServiceContext, SessionExecutor};
use raft_session::session::{CommandAdmission, GateCallback};
use raft_session::{AppData, AppDataResponse, AppEvent, MemberId, SessionContext, SessionId, SessionState};

/// The thing a `MemoryNode` applies commands to and evaluates queries against.
/// Given `&mut SessionContext` during `apply` so tests can exercise
/// `publish`-during-command-application the same way a real service would.
pub trait StateMachine<D: AppData, R: AppDataResponse, E: AppEvent>: Send + Sync {
    fn apply(&self, operation: &D, session: &mut SessionContext<D, R, E>) -> R;
    fn query(&self, operation: &D) -> R;
}

struct InlineExecutor;

impl SessionExecutor for InlineExecutor {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
        tokio::spawn(future);
    }
}

/// The single replicated backend every `MemoryNode` in a `MemoryCluster`
/// shares: sessions, the applied index, and the state machine. Models the
/// guarantee spec.md's consensus oracle provides — all members apply the same
/// entries in the same order — without implementing replication itself.
struct Shared<D: AppData, R: AppDataResponse, E: AppEvent> {
    service_type: String,
    service_name: String,
    current_index: AtomicU64,
    current_operation: Mutex<OperationKind>,
    state_machine: Arc<dyn StateMachine<D, R, E>>,
    sessions: Mutex<HashMap<SessionId, Mutex<SessionContext<D, R, E>>>>,
    next_session_id: AtomicU64,
    reset_listeners: Mutex<HashMap<SessionId, (ResetHandler, Arc<dyn SessionExecutor>)>>,
    published: Mutex<Vec<(MemberId, PublishRequest<E>)>>,
    /// The member the simulated cluster currently agrees is leader, if any.
    /// Read by `Shared::is_leader` (gates `EventQueue::send_events`) and by
    /// every `MemoryNode::is_leader` (gates RPC acceptance).
    current_leader: Mutex<Option<MemberId>>,
    self_ref: Weak<Shared<D, R, E>>,
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> ServiceContext for Shared<D, R, E> {
    fn current_index(&self) -> u64 {
        self.current_index.load(Ordering::SeqCst)
    }

    fn current_operation(&self) -> OperationKind {
        *self.current_operation.lock().unwrap()
    }

    fn executor(&self) -> Arc<dyn SessionExecutor> {
        Arc::new(InlineExecutor)
    }

    fn service_type(&self) -> &str {
        &self.service_type
    }

    fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> ServerContext<E> for Shared<D, R, E> {
    /// Whether *some* member of the cluster currently holds leadership.
    /// `SessionContext` only ever reaches this check synchronously, inside
    /// the same command application that already passed a per-member
    /// `MemoryNode::is_leader` gate (or was driven directly by a test
    /// simulating a follower's replicated apply) — so collapsing "am I the
    /// leader" to "is there a leader" is faithful to spec §4.6's "no-op
    /// when not leader" for every case this harness can express.
    fn is_leader(&self) -> bool {
        self.current_leader.lock().unwrap().is_some()
    }

    fn protocol(&self) -> Arc<dyn ServerProtocol<E>> {
        self.self_ref.upgrade().expect("shared backend dropped while still in use")
    }
}

#[async_trait]
impl<D: AppData, R: AppDataResponse, E: AppEvent> ServerProtocol<E> for Shared<D, R, E> {
    async fn publish(&self, member: MemberId, request: PublishRequest<E>) {
        self.published.lock().unwrap().push((member, request));
    }

    fn register_reset_listener(&self, session: SessionId, handler: ResetHandler, executor: Arc<dyn SessionExecutor>) {
        self.reset_listeners.lock().unwrap().insert(session, (handler, executor));
    }

    fn unregister_reset_listener(&self, session: SessionId) {
        self.reset_listeners.lock().unwrap().remove(&session);
    }
}

/// One simulated cluster member: a network-reachable, possibly-leading face
/// onto the cluster's shared replicated backend (spec §6's `ServerContext`).
pub struct MemoryNode<D: AppData, R: AppDataResponse, E: AppEvent> {
    id: MemberId,
    shared: Arc<Shared<D, R, E>>,
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> MemoryNode<D, R, E> {
    fn new(id: MemberId, shared: Arc<Shared<D, R, E>>) -> Arc<Self> {
        Arc::new(Self { id, shared })
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn published(&self) -> Vec<(MemberId, PublishRequest<E>)> {
        self.shared.published.lock().unwrap().clone()
    }

    pub fn session_state(&self, session: SessionId) -> Option<SessionState> {
        self.shared
            .sessions
            .lock()
            .unwrap()
            .get(&session)
            .map(|ctx| ctx.lock().unwrap().state())
    }

    /// Run `f` with exclusive access to a session's context, for tests driving
    /// `SessionContext` operations the six RPCs don't exercise directly (raw
    /// admission ordering, result-cache GC, gate registration, ...).
    pub fn with_session<T>(&self, session: SessionId, f: impl FnOnce(&mut SessionContext<D, R, E>) -> T) -> Option<T> {
        let sessions = self.shared.sessions.lock().unwrap();
        sessions.get(&session).map(|ctx| f(&mut ctx.lock().unwrap()))
    }

    /// Simulate a client-issued reset arriving out-of-band, as a transport
    /// would deliver it to the registered handler.
    pub fn trigger_reset(&self, session: SessionId, index: u64) {
        let listener = self.shared.reset_listeners.lock().unwrap().get(&session).cloned();
        if let Some((handler, executor)) = listener {
            let request = ResetRequest { session_id: session, index };
            executor.spawn(Box::pin(async move {
                handler(request);
            }));
        }
    }

    /// Apply an already-admitted command directly against the shared state
    /// machine, bypassing the leader gate every `ClientProtocol::command` call
    /// normally enforces. Models a follower re-applying an entry the log has
    /// already committed (spec §4.6's "re-application on a follower after
    /// leadership change") for tests that need to drive that path without a
    /// second live leader.
    pub fn apply_committed(&self, session: SessionId, operation: D) -> Option<R> {
        let sessions = self.shared.sessions.lock().unwrap();
        let ctx_lock = sessions.get(&session)?;
        let mut ctx = ctx_lock.lock().unwrap();
        Some(self.shared.apply_one(&mut ctx, operation).1)
    }

    /// Whether this specific member currently believes itself the cluster leader.
    fn is_self_leader(&self) -> bool {
        *self.shared.current_leader.lock().unwrap() == Some(self.id)
    }
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> Shared<D, R, E> {
    /// Apply one admitted command: advances the simulated log index, runs the
    /// state machine (which may call `session.publish`), and commits the
    /// resulting event batch.
    fn apply_one(&self, session: &mut SessionContext<D, R, E>, operation: D) -> (u64, R) {
        let index = self.current_index.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current_operation.lock().unwrap() = OperationKind::Command;
        let result = self.state_machine.apply(&operation, session);
        *self.current_operation.lock().unwrap() = OperationKind::None;
        session.commit(index);
        (index, result)
    }
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> ServerContext<E> for MemoryNode<D, R, E> {
    fn is_leader(&self) -> bool {
        self.is_self_leader()
    }

    fn protocol(&self) -> Arc<dyn ServerProtocol<E>> {
        self.shared.clone()
    }
}

#[async_trait]
impl<D: AppData, R: AppDataResponse, E: AppEvent> ClientProtocol<D, R> for MemoryNode<D, R, E> {
    async fn open_session(
        &self,
        _member: MemberId,
        request: OpenSessionRequest,
    ) -> Result<Status<OpenSessionResponse>, TransportError> {
        if !self.is_self_leader() {
            return Ok(Status::Error(ApplicationErrorKind::NoLeader));
        }
        let id = SessionId::new(self.shared.next_session_id.fetch_add(1, Ordering::SeqCst));
        let service: Arc<dyn ServiceContext> = self.shared.clone();
        let server: Arc<dyn ServerContext<E>> = self.shared.clone();
        let context = SessionContext::new(id, request.service_type, request.service_name, 0, service, server);
        self.shared.sessions.lock().unwrap().insert(id, Mutex::new(context));
        Ok(Status::Ok(OpenSessionResponse {
            session_id: id,
            timeout_millis: request.timeout_millis,
        }))
    }

    async fn close_session(
        &self,
        _member: MemberId,
        request: CloseSessionRequest,
    ) -> Result<Status<CloseSessionResponse>, TransportError> {
        let sessions = self.shared.sessions.lock().unwrap();
        match sessions.get(&request.session_id) {
            Some(ctx) => {
                ctx.lock().unwrap().close();
                Ok(Status::Ok(CloseSessionResponse {}))
            }
            None => Ok(Status::Error(ApplicationErrorKind::UnknownSession)),
        }
    }

    async fn keep_alive(
        &self,
        member: MemberId,
        request: KeepAliveRequest,
    ) -> Result<Status<KeepAliveResponse>, TransportError> {
        let sessions = self.shared.sessions.lock().unwrap();
        match sessions.get(&request.session_id) {
            Some(ctx) => {
                let mut ctx = ctx.lock().unwrap();
                ctx.set_connection(member);
                ctx.clear_results(request.command_sequence);
                ctx.clear_events(request.event_index);
                Ok(Status::Ok(KeepAliveResponse {
                    succeeded_session_ids: vec![request.session_id],
                }))
            }
            None => Ok(Status::Error(ApplicationErrorKind::UnknownSession)),
        }
    }

    async fn command(
        &self,
        member: MemberId,
        request: CommandRequest<D>,
    ) -> Result<Status<CommandResponse<R>>, TransportError> {
        if !self.is_self_leader() {
            return Ok(Status::Error(ApplicationErrorKind::NoLeader));
        }
        let sessions = self.shared.sessions.lock().unwrap();
        let ctx_lock = match sessions.get(&request.session_id) {
            Some(ctx) => ctx,
            None => return Ok(Status::Error(ApplicationErrorKind::UnknownSession)),
        };
        let mut ctx = ctx_lock.lock().unwrap();
        ctx.set_connection(member);
        ctx.update_request_sequence(request.sequence);
        match ctx.admit_command(request.sequence, request.operation) {
            CommandAdmission::Apply(operation) => {
                let (index, result) = self.shared.apply_one(&mut ctx, operation);
                let mut next = ctx.complete_command(request.sequence, result.clone());
                while let Some((next_sequence, next_operation)) = next {
                    let (_, next_result) = self.shared.apply_one(&mut ctx, next_operation);
                    next = ctx.complete_command(next_sequence, next_result);
                }
                Ok(Status::Ok(CommandResponse { index, result }))
            }
            CommandAdmission::Deferred => Ok(Status::Empty),
            CommandAdmission::Cached(result) => Ok(Status::Ok(CommandResponse {
                index: ctx.last_applied(),
                result,
            })),
            CommandAdmission::Expired => Ok(Status::Error(ApplicationErrorKind::CommandFailure)),
        }
    }

    async fn query(
        &self,
        member: MemberId,
        request: QueryRequest<D>,
    ) -> Result<Status<QueryResponse<R>>, TransportError> {
        if !self.is_self_leader() {
            return Ok(Status::Error(ApplicationErrorKind::NoLeader));
        }
        let (tx, rx) = tokio::sync::oneshot::channel();
        {
            let sessions = self.shared.sessions.lock().unwrap();
            let ctx_lock = match sessions.get(&request.session_id) {
                Some(ctx) => ctx,
                None => return Ok(Status::Error(ApplicationErrorKind::UnknownSession)),
            };
            let mut ctx = ctx_lock.lock().unwrap();
            ctx.set_connection(member);
            let mut tx = Some(tx);
            let callback: GateCallback = Box::new(move || {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            });
            match request.consistency {
                ReadConsistency::Sequential => ctx.register_sequence_query(request.sequence, callback),
                ReadConsistency::Linearizable => ctx.register_index_query(request.index, callback),
            }
        }
        if rx.await.is_err() {
            return Ok(Status::Error(ApplicationErrorKind::UnknownSession));
        }
        let sessions = self.shared.sessions.lock().unwrap();
        let ctx_lock = match sessions.get(&request.session_id) {
            Some(ctx) => ctx,
            None => return Ok(Status::Error(ApplicationErrorKind::UnknownSession)),
        };
        let ctx = ctx_lock.lock().unwrap();
        *self.shared.current_operation.lock().unwrap() = OperationKind::Query;
        let result = self.shared.state_machine.query(&request.operation);
        *self.shared.current_operation.lock().unwrap() = OperationKind::None;
        Ok(Status::Ok(QueryResponse {
            index: ctx.last_applied(),
            result,
        }))
    }

    async fn metadata(
        &self,
        _member: MemberId,
        request: MetadataRequest,
    ) -> Result<Status<MetadataResponse>, TransportError> {
        let sessions = self.shared.sessions.lock().unwrap();
        let session_ids = sessions
            .values()
            .filter_map(|ctx| {
                let ctx = ctx.lock().unwrap();
                if ctx.service_name() == request.service_name {
                    Some(ctx.id())
                } else {
                    None
                }
            })
            .collect();
        Ok(Status::Ok(MetadataResponse { session_ids }))
    }
}

/// A simulated cluster: a set of `MemoryNode`s sharing one replicated backend
/// and reachable by member id, with the ability to flip leadership and
/// simulate unreachable members for `ClientConnection` failover tests.
pub struct MemoryCluster<D: AppData, R: AppDataResponse, E: AppEvent> {
    shared: Arc<Shared<D, R, E>>,
    nodes: Mutex<HashMap<MemberId, Arc<MemoryNode<D, R, E>>>>,
    unreachable: Mutex<HashSet<MemberId>>,
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> MemoryCluster<D, R, E> {
    pub fn new(service_type: &str, service_name: &str, state_machine: Arc<dyn StateMachine<D, R, E>>) -> Arc<Self> {
        let shared = Arc::new_cyclic(|weak| Shared {
            service_type: service_type.to_string(),
            service_name: service_name.to_string(),
            current_index: AtomicU64::new(0),
            current_operation: Mutex::new(OperationKind::None),
            state_machine,
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            reset_listeners: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            current_leader: Mutex::new(None),
            self_ref: weak.clone(),
        });
        Arc::new(Self {
            shared,
            nodes: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(HashSet::new()),
        })
    }

    pub fn add_node(&self, id: MemberId) -> Arc<MemoryNode<D, R, E>> {
        let node = MemoryNode::new(id, self.shared.clone());
        self.nodes.lock().unwrap().insert(id, node.clone());
        node
    }

    pub fn set_leader(&self, id: MemberId) {
        *self.shared.current_leader.lock().unwrap() = Some(id);
    }

    /// Depose the current leader with no replacement, e.g. to simulate a
    /// follower applying an already-committed entry outside of an election
    /// (spec §4.6 P7: `sendEvents` must no-op while no member is leader).
    pub fn clear_leader(&self) {
        *self.shared.current_leader.lock().unwrap() = None;
    }

    pub fn set_unreachable(&self, id: MemberId) {
        self.unreachable.lock().unwrap().insert(id);
    }

    pub fn set_reachable(&self, id: MemberId) {
        self.unreachable.lock().unwrap().remove(&id);
    }

    pub fn node(&self, id: MemberId) -> Option<Arc<MemoryNode<D, R, E>>> {
        self.nodes.lock().unwrap().get(&id).cloned()
    }

    pub fn member_ids(&self) -> Vec<MemberId> {
        self.nodes.lock().unwrap().keys().copied().collect()
    }

    pub fn published(&self) -> Vec<(MemberId, PublishRequest<E>)> {
        self.shared.published.lock().unwrap().clone()
    }

    fn resolve(&self, member: MemberId) -> Result<Arc<MemoryNode<D, R, E>>, TransportError> {
        if self.unreachable.lock().unwrap().contains(&member) {
            return Err(TransportError::ConnectionRefused);
        }
        self.nodes
            .lock()
            .unwrap()
            .get(&member)
            .cloned()
            .ok_or(TransportError::ConnectionRefused)
    }
}

#[async_trait]
impl<D: AppData, R: AppDataResponse, E: AppEvent> ClientProtocol<D, R> for MemoryCluster<D, R, E> {
    async fn open_session(
        &self,
        member: MemberId,
        request: OpenSessionRequest,
    ) -> Result<Status<OpenSessionResponse>, TransportError> {
        self.resolve(member)?.open_session(member, request).await
    }

    async fn close_session(
        &self,
        member: MemberId,
        request: CloseSessionRequest,
    ) -> Result<Status<CloseSessionResponse>, TransportError> {
        self.resolve(member)?.close_session(member, request).await
    }

    async fn keep_alive(
        &self,
        member: MemberId,
        request: KeepAliveRequest,
    ) -> Result<Status<KeepAliveResponse>, TransportError> {
        self.resolve(member)?.keep_alive(member, request).await
    }

    async fn command(
        &self,
        member: MemberId,
        request: CommandRequest<D>,
    ) -> Result<Status<CommandResponse<R>>, TransportError> {
        self.resolve(member)?.command(member, request).await
    }

    async fn query(
        &self,
        member: MemberId,
        request: QueryRequest<D>,
    ) -> Result<Status<QueryResponse<R>>, TransportError> {
        self.resolve(member)?.query(member, request).await
    }

    async fn metadata(
        &self,
        member: MemberId,
        request: MetadataRequest,
    ) -> Result<Status<MetadataResponse>, TransportError> {
        self.resolve(member)?.metadata(member, request).await
    }
}
