//! Client-session core for a Raft-based replicated state machine runtime.
//!
//! This crate treats leader election and log replication as an external
//! oracle (`ServiceContext`/`ServerContext`) and implements everything layered
//! on top of it: a leader-seeking, auto-retrying `ClientConnection`, and the
//! server-side `SessionContext` bookkeeping that gives client sessions
//! exactly-once commands, gated linearizable/sequential queries, and ordered,
//! replayable event delivery.
#![cfg_attr(feature = "docinclude", feature(external_doc))]

pub mod client;
pub mod config;
pub mod error;
mod ids;
pub mod member_selector;
pub mod protocol;
pub mod service;
pub mod session;

pub use client::ClientConnection;
pub use config::Config;
pub use error::{ApplicationErrorKind, SessionError, TransportError};
pub use ids::{MemberId, SessionId};
pub use member_selector::MemberSelector;
pub use session::{SessionContext, SessionListener, SessionState};

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A command or query operation payload. Blanket-implemented for any type
/// meeting the bound, mirroring how consensus-layer application data is
/// typically declared.
pub trait AppData: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}
impl<T> AppData for T where T: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// The result of applying a command, or of evaluating a query.
pub trait AppDataResponse: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}
impl<T> AppDataResponse for T where T: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// A single event published to a session's client during command application.
pub trait AppEvent: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}
impl<T> AppEvent for T where T: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}
