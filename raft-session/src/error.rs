//! The session-core error taxonomy (see spec §7).

/// The closed set of application-level error kinds a `ClientProtocol` response
/// may carry. A subset of these are *terminal*: a `ClientConnection` stops
/// retrying and surfaces them to the caller verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ApplicationErrorKind {
    NoLeader,
    QueryFailure,
    CommandFailure,
    ApplicationError,
    IllegalMemberState,
    UnknownClient,
    UnknownSession,
    UnknownService,
    ProtocolError,
    ConfigurationError,
}

impl ApplicationErrorKind {
    /// Whether a `ClientConnection` must stop retrying and return this error to the caller.
    ///
    /// Frozen by spec §4.2: everything not in this set is retried on the next member.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CommandFailure
                | Self::QueryFailure
                | Self::ApplicationError
                | Self::UnknownClient
                | Self::UnknownSession
                | Self::UnknownService
                | Self::ProtocolError
        )
    }
}

impl std::fmt::Display for ApplicationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Failures a `ClientProtocol` RPC may report before an application response is even
/// produced: the transport category of spec §7.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("timed out waiting for a response")]
    Timeout,
    #[error("channel closed")]
    ChannelClosed,
    /// A local exception that is not a transport failure — e.g. a serialization bug.
    /// Per spec §4.2 this is surfaced directly, never retried.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    /// Whether `ClientConnection::dispatch` should retry on the next member for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionRefused | Self::Timeout | Self::ChannelClosed)
    }
}

/// The error surfaced to a `ClientConnection` caller.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The member selector was exhausted before a request could succeed.
    #[error("no reachable cluster member")]
    NoRoute,
    /// A terminal application error, returned verbatim from the responding member.
    #[error("application error: {0}")]
    Application(ApplicationErrorKind),
    /// A programmer error: an operation was attempted outside of the preconditions
    /// spec §3/§4.5/§4.6 require of it (e.g. publishing on a terminal session).
    #[error("operation not permitted: {0}")]
    Invariant(&'static str),
    /// The connection (or the session it serves) is shutting down.
    #[error("client connection is shutting down")]
    ShuttingDown,
    /// A non-retryable local exception propagated from the transport layer.
    #[error(transparent)]
    Local(#[from] anyhow::Error),
}
