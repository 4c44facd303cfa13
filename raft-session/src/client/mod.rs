//! Client-side session dispatch: a leader-seeking, auto-retrying connection
//! over the six `ClientProtocol` RPCs (spec §4.2).

pub mod requests;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{SessionError, TransportError};
use crate::ids::MemberId;
use crate::member_selector::MemberSelector;
use crate::protocol::{ClientProtocol, Status};
use crate::{AppData, AppDataResponse};

use requests::{
    CloseSessionRequest, CloseSessionResponse, CommandRequest, CommandResponse, KeepAliveRequest,
    KeepAliveResponse, MetadataRequest, MetadataResponse, OpenSessionRequest, OpenSessionResponse,
    QueryRequest, QueryResponse,
};

struct ConnectionState {
    selector: MemberSelector,
    /// The member the next request is pinned to, cleared on any retry so the
    /// selector is consulted again (spec §4.2).
    member: Option<MemberId>,
}

struct ConnectionInner<D: AppData, R: AppDataResponse> {
    config: Arc<Config>,
    protocol: Arc<dyn ClientProtocol<D, R>>,
    state: Mutex<ConnectionState>,
}

/// A session's single logical connection to the cluster.
///
/// Bound to one cooperative executor at a time: the internal state is guarded
/// by an async mutex so at most one request is ever mid-dispatch, mirroring
/// the "runs on a single-threaded executor" requirement of spec §5 without
/// requiring a literal dedicated OS thread.
pub struct ClientConnection<D: AppData, R: AppDataResponse> {
    inner: Arc<ConnectionInner<D, R>>,
}

impl<D: AppData, R: AppDataResponse> Clone for ClientConnection<D, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: AppData, R: AppDataResponse> ClientConnection<D, R> {
    pub fn new(
        config: Arc<Config>,
        protocol: Arc<dyn ClientProtocol<D, R>>,
        leader: Option<MemberId>,
        servers: Vec<MemberId>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                config,
                protocol,
                state: Mutex::new(ConnectionState {
                    selector: MemberSelector::new(leader, servers),
                    member: None,
                }),
            }),
        }
    }

    /// Replace the known leader/member set, e.g. after a `metadata` RPC reveals a
    /// newer view of the cluster.
    pub async fn reset_members(&self, leader: Option<MemberId>, servers: Vec<MemberId>) {
        let mut state = self.inner.state.lock().await;
        state.selector.reset_with(leader, servers);
        state.member = None;
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(cluster = %self.inner.config.cluster_name))]
    pub async fn open_session(
        &self,
        request: OpenSessionRequest,
    ) -> Result<Option<OpenSessionResponse>, SessionError> {
        self.dispatch(request, |protocol, member, request| {
            Box::pin(async move { protocol.open_session(member, request).await })
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(cluster = %self.inner.config.cluster_name))]
    pub async fn close_session(
        &self,
        request: CloseSessionRequest,
    ) -> Result<Option<CloseSessionResponse>, SessionError> {
        self.dispatch(request, |protocol, member, request| {
            Box::pin(async move { protocol.close_session(member, request).await })
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(cluster = %self.inner.config.cluster_name))]
    pub async fn keep_alive(
        &self,
        request: KeepAliveRequest,
    ) -> Result<Option<KeepAliveResponse>, SessionError> {
        self.dispatch(request, |protocol, member, request| {
            Box::pin(async move { protocol.keep_alive(member, request).await })
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(cluster = %self.inner.config.cluster_name))]
    pub async fn command(
        &self,
        request: CommandRequest<D>,
    ) -> Result<Option<CommandResponse<R>>, SessionError> {
        self.dispatch(request, |protocol, member, request| {
            Box::pin(async move { protocol.command(member, request).await })
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(cluster = %self.inner.config.cluster_name))]
    pub async fn query(
        &self,
        request: QueryRequest<D>,
    ) -> Result<Option<QueryResponse<R>>, SessionError> {
        self.dispatch(request, |protocol, member, request| {
            Box::pin(async move { protocol.query(member, request).await })
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(cluster = %self.inner.config.cluster_name))]
    pub async fn metadata(
        &self,
        request: MetadataRequest,
    ) -> Result<Option<MetadataResponse>, SessionError> {
        self.dispatch(request, |protocol, member, request| {
            Box::pin(async move { protocol.metadata(member, request).await })
        })
        .await
    }

    /// The single retry/classification routine every RPC above funnels through
    /// (spec §4.2):
    /// - transport error → drop the member pin (if still held) and retry on the
    ///   next selector candidate with the same request;
    /// - terminal application error → reset the selector and surface it;
    /// - retryable application error → retry on the next member;
    /// - ok / empty → rewind the selector (so a future retry starts from the
    ///   leader hint again) without clearing the pin, and complete.
    async fn dispatch<Req, Resp, F>(&self, request: Req, call: F) -> Result<Option<Resp>, SessionError>
    where
        Req: Clone + Send + 'static,
        Resp: Send + 'static,
        F: Fn(Arc<dyn ClientProtocol<D, R>>, MemberId, Req) -> BoxFuture<'static, Result<Status<Resp>, TransportError>>,
    {
        loop {
            let member = self.resolve_member().await?;
            match call(self.inner.protocol.clone(), member, request.clone()).await {
                Ok(Status::Ok(response)) => {
                    self.rewind_selector().await;
                    return Ok(Some(response));
                }
                Ok(Status::Empty) => {
                    self.rewind_selector().await;
                    return Ok(None);
                }
                Ok(Status::Error(kind)) if kind.is_terminal() => {
                    self.reset_selector().await;
                    return Err(SessionError::Application(kind));
                }
                Ok(Status::Error(kind)) => {
                    tracing::debug!(member, ?kind, "retryable application error, retrying on next member");
                    self.clear_pin(member).await;
                }
                Err(err) if err.is_retryable() => {
                    tracing::debug!(member, error = %err, "transport error, retrying on next member");
                    self.clear_pin(member).await;
                }
                Err(err) => {
                    return Err(SessionError::Local(err.into()));
                }
            }
        }
    }

    async fn resolve_member(&self) -> Result<MemberId, SessionError> {
        let mut state = self.inner.state.lock().await;
        if let Some(member) = state.member {
            return Ok(member);
        }
        match state.selector.next() {
            Some(member) => {
                state.member = Some(member);
                Ok(member)
            }
            None => {
                state.selector.reset();
                Err(SessionError::NoRoute)
            }
        }
    }

    async fn clear_pin(&self, member: MemberId) {
        let mut state = self.inner.state.lock().await;
        if state.member == Some(member) {
            state.member = None;
        }
    }

    async fn reset_selector(&self) {
        let mut state = self.inner.state.lock().await;
        state.selector.reset();
        state.member = None;
    }

    /// Rewind the selector to the start of its rotation without clearing the
    /// member pin. Used on successful completion: spec §4.2 requires a future
    /// transient failure to start retrying afresh from the leader hint, but
    /// the pin itself "is cleared only on retry, never on success" — so the
    /// just-discovered leader stays pinned for the next request.
    async fn rewind_selector(&self) {
        let mut state = self.inner.state.lock().await;
        state.selector.reset();
    }
}
