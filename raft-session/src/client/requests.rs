//! The six request/response pairs a `ClientConnection` dispatches, plus the
//! reset notification delivered back from server to client (spec §6).

use crate::ids::SessionId;
use crate::{AppData, AppDataResponse};

/// The consistency a query was submitted under (spec §4.3-§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReadConsistency {
    /// Released once the server's `commandSequence` reaches the query's
    /// `sequence`, guaranteeing the query observes every command the client has
    /// already issued (spec §4.3).
    Sequential,
    /// Released only once the server's `lastApplied` reaches the query's
    /// `index` (spec §4.4).
    Linearizable,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OpenSessionRequest {
    pub service_type: String,
    pub service_name: String,
    pub timeout_millis: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: SessionId,
    pub timeout_millis: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: SessionId,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CloseSessionResponse {}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct KeepAliveRequest {
    pub session_id: SessionId,
    pub command_sequence: u64,
    pub event_index: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct KeepAliveResponse {
    pub succeeded_session_ids: Vec<SessionId>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "D: AppData")]
pub struct CommandRequest<D: AppData> {
    pub session_id: SessionId,
    pub sequence: u64,
    pub operation: D,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "R: AppDataResponse")]
pub struct CommandResponse<R: AppDataResponse> {
    pub index: u64,
    pub result: R,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "D: AppData")]
pub struct QueryRequest<D: AppData> {
    pub session_id: SessionId,
    pub sequence: u64,
    pub index: u64,
    pub consistency: ReadConsistency,
    pub operation: D,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "R: AppDataResponse")]
pub struct QueryResponse<R: AppDataResponse> {
    pub index: u64,
    pub result: R,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MetadataRequest {
    pub service_name: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MetadataResponse {
    pub session_ids: Vec<SessionId>,
}

/// Delivered to a session's registered reset listener when a client reports it
/// has durably received event batches up to `index` (spec §4.6, "clearEvents").
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResetRequest {
    pub session_id: SessionId,
    pub index: u64,
}
