//! The two RPC surfaces a transport binds session core to: the client-facing
//! six-RPC `ClientProtocol`, and the server-facing push/reset `ServerProtocol`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::requests::{
    CloseSessionRequest, CloseSessionResponse, CommandRequest, CommandResponse, KeepAliveRequest,
    KeepAliveResponse, MetadataRequest, MetadataResponse, OpenSessionRequest, OpenSessionResponse,
    QueryRequest, QueryResponse, ResetRequest,
};
use crate::error::{ApplicationErrorKind, TransportError};
use crate::ids::{MemberId, SessionId};
use crate::service::SessionExecutor;
use crate::{AppData, AppDataResponse, AppEvent};

/// The outcome of a `ClientProtocol` RPC, one layer above transport failure
/// (spec §6-§7): either the operation's typed response, a terminal/retryable
/// application error, or a quiesced no-op ("null response with no error").
#[derive(Debug)]
pub enum Status<T> {
    Ok(T),
    Empty,
    Error(ApplicationErrorKind),
}

/// The client-facing RPC surface: six request/response pairs, each independently
/// retriable by a `ClientConnection` (spec §4.2, §6).
#[async_trait]
pub trait ClientProtocol<D: AppData, R: AppDataResponse>: Send + Sync {
    async fn open_session(
        &self,
        member: MemberId,
        request: OpenSessionRequest,
    ) -> Result<Status<OpenSessionResponse>, TransportError>;

    async fn close_session(
        &self,
        member: MemberId,
        request: CloseSessionRequest,
    ) -> Result<Status<CloseSessionResponse>, TransportError>;

    async fn keep_alive(
        &self,
        member: MemberId,
        request: KeepAliveRequest,
    ) -> Result<Status<KeepAliveResponse>, TransportError>;

    async fn command(
        &self,
        member: MemberId,
        request: CommandRequest<D>,
    ) -> Result<Status<CommandResponse<R>>, TransportError>;

    async fn query(
        &self,
        member: MemberId,
        request: QueryRequest<D>,
    ) -> Result<Status<QueryResponse<R>>, TransportError>;

    async fn metadata(
        &self,
        member: MemberId,
        request: MetadataRequest,
    ) -> Result<Status<MetadataResponse>, TransportError>;
}

/// A batch of events pushed to a client out-of-band of the request/response RPCs
/// above (spec §4.6, "Publish").
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "E: AppEvent")]
pub struct PublishRequest<E: AppEvent> {
    pub session: u64,
    pub event_index: u64,
    pub previous_index: u64,
    pub events: Vec<E>,
}

/// Invoked when a client instructs the server to discard acknowledged event
/// batches (spec §4.6, "clearEvents").
pub type ResetHandler = Arc<dyn Fn(ResetRequest) + Send + Sync>;

/// The server-facing surface an `EventQueue` pushes batches through, and through
/// which a transport delivers client-issued resets back to the owning session.
#[async_trait]
pub trait ServerProtocol<E: AppEvent>: Send + Sync {
    /// Fire-and-forget event push to a specific member believed to host the
    /// session's client connection.
    async fn publish(&self, member: MemberId, request: PublishRequest<E>);

    /// Register the handler a transport should invoke when it receives a reset
    /// for this session, dispatched onto the given executor.
    fn register_reset_listener(
        &self,
        session: SessionId,
        handler: ResetHandler,
        executor: Arc<dyn SessionExecutor>,
    );

    /// Remove a previously registered reset handler, e.g. once a session reaches
    /// a terminal state (spec §4.5).
    fn unregister_reset_listener(&self, session: SessionId);
}
