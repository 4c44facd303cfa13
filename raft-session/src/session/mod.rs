//! Server-side per-session bookkeeping (spec §3, §4.5-§4.7).

mod events;
mod gates;
pub mod listeners;
mod sequencing;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;

pub use events::EventBatch;
pub use gates::GateCallback;
pub use listeners::SessionListener;
pub use sequencing::CommandAdmission;

use crate::client::requests::ResetRequest;
use crate::ids::{MemberId, SessionId};
use crate::service::{ServerContext, ServiceContext};
use crate::{AppData, AppDataResponse, AppEvent};

use gates::GateMap;
use listeners::Listeners;
use sequencing::PendingEntry;

/// The lifecycle of a session (spec §3, §4.5).
///
/// `Open` is the only state a session may start in; every other state is
/// terminal or semi-terminal and reachable only by explicit transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Missed at least one keep-alive window but not yet expired; inferred
    /// client-side, never transitioned into by `SessionContext` itself.
    Suspended,
    Expired,
    Closed,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Suspended)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Closed)
    }
}

/// Server-side state for one client session: sequencing, the result cache,
/// the event queue, and the listener registry, exclusively mutated on the
/// session's own executor (spec §5).
pub struct SessionContext<D: AppData, R: AppDataResponse, E: AppEvent> {
    id: SessionId,
    service_type: String,
    service_name: String,
    state: SessionState,
    timestamp: i64,

    request_sequence: u64,
    command_sequence: u64,
    command_low_water_mark: u64,
    last_applied: u64,
    event_index: u64,
    complete_index: u64,

    /// The member believed to currently host this session's client connection;
    /// `EventQueue::send_events` targets it. Updated whenever a command, query,
    /// or keep-alive RPC for this session arrives from a member.
    connection: Option<MemberId>,

    sequence_queries: GateMap,
    index_queries: GateMap,
    pending_commands: BTreeMap<u64, PendingEntry<D>>,
    results: BTreeMap<u64, R>,
    events: VecDeque<EventBatch<E>>,
    current_event_batch: Option<EventBatch<E>>,
    listeners: Listeners,

    service: Arc<dyn ServiceContext>,
    server: Arc<dyn ServerContext<E>>,
    reset_rx: mpsc::UnboundedReceiver<ResetRequest>,
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> SessionContext<D, R, E> {
    /// Construct a session anchored at `id`: `eventIndex`, `completeIndex`, and
    /// `lastApplied` all start at the session's own id value (spec §3), and a
    /// reset listener is registered with the server's protocol for the
    /// session's lifetime.
    pub fn new(
        id: SessionId,
        service_type: String,
        service_name: String,
        timestamp: i64,
        service: Arc<dyn ServiceContext>,
        server: Arc<dyn ServerContext<E>>,
    ) -> Self {
        let (tx, reset_rx) = mpsc::unbounded_channel();
        let handler: crate::protocol::ResetHandler = Arc::new(move |request: ResetRequest| {
            let _ = tx.send(request);
        });
        server
            .protocol()
            .register_reset_listener(id, handler, service.executor());

        let anchor = id.as_u64();
        Self {
            id,
            service_type,
            service_name,
            state: SessionState::Open,
            timestamp,
            request_sequence: 0,
            command_sequence: 0,
            command_low_water_mark: 0,
            last_applied: anchor,
            event_index: anchor,
            complete_index: anchor,
            connection: None,
            sequence_queries: GateMap::new(),
            index_queries: GateMap::new(),
            pending_commands: BTreeMap::new(),
            results: BTreeMap::new(),
            events: VecDeque::new(),
            current_event_batch: None,
            listeners: Listeners::default(),
            service,
            server,
            reset_rx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn complete_index(&self) -> u64 {
        self.complete_index
    }

    pub fn event_index(&self) -> u64 {
        self.event_index
    }

    /// Re-arm the keep-alive deadline. Tolerant of stale/duplicate timestamps:
    /// only ever advances.
    pub fn update_timestamp(&mut self, timestamp: i64) {
        self.timestamp = self.timestamp.max(timestamp);
    }

    /// Record the member a request for this session was most recently served
    /// from, so outgoing event batches are pushed to the right place.
    pub fn set_connection(&mut self, member: MemberId) {
        self.connection = Some(member);
    }

    /// Await the next client-issued reset for this session (spec §4.6,
    /// "clearEvents"). Intended to be polled from the owning task's event loop
    /// alongside command/query admission.
    pub async fn next_reset(&mut self) -> Option<ResetRequest> {
        self.reset_rx.recv().await
    }

    pub fn register_sequence_query(&mut self, sequence: u64, callback: GateCallback) {
        let current = self.command_sequence;
        gates::register(&mut self.sequence_queries, sequence, current, callback);
    }

    pub fn register_index_query(&mut self, index: u64, callback: GateCallback) {
        let current = self.last_applied;
        gates::register(&mut self.index_queries, index, current, callback);
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) {
        self.listeners.remove(listener);
    }

    /// Transition to `Expired`. A no-op if the session has already reached a
    /// terminal state.
    pub fn expire(&mut self) {
        self.transition(SessionState::Expired);
    }

    /// Transition to `Closed`. A no-op if the session has already reached a
    /// terminal state.
    pub fn close(&mut self) {
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, new_state: SessionState) {
        if self.state.is_terminal() || self.state == new_state {
            return;
        }
        tracing::debug!(session = %self.id, from = ?self.state, to = ?new_state, "session state transition");
        self.state = new_state;
        self.listeners.notify(self.id, new_state);
        if new_state.is_terminal() {
            self.server.protocol().unregister_reset_listener(self.id);
        }
    }
}
