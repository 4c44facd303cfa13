use std::fmt;

/// The opaque, stable identifier of a cluster node (spec §3).
///
/// Concrete rather than generic, mirroring how the consensus layer below it
/// identifies members: a session never needs to know more about a member
/// than this.
pub type MemberId = u64;

/// Uniquely identifies a session for its entire lifetime.
///
/// Resolved as an open question in favor of structural equality: two
/// `SessionId`s are equal iff their wrapped values are equal, never by
/// identity of the wrapping allocation. Its numeric value doubles as the
/// session's anchor for `eventIndex` and `completeIndex` at open time
/// (spec §3, §4.6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
