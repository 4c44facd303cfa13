use crate::ids::MemberId;

/// Leader-hinted round-robin iterator over cluster members (spec §4.1).
///
/// Yields the known leader first (if any), then every other member exactly
/// once, skipping the leader on the second pass so it is never yielded twice.
#[derive(Clone, Debug, Default)]
pub struct MemberSelector {
    leader: Option<MemberId>,
    servers: Vec<MemberId>,
    cursor: usize,
    yielded_leader: bool,
}

impl MemberSelector {
    pub fn new(leader: Option<MemberId>, servers: Vec<MemberId>) -> Self {
        let mut this = Self {
            leader,
            servers,
            cursor: 0,
            yielded_leader: false,
        };
        this.reset();
        this
    }

    pub fn leader(&self) -> Option<MemberId> {
        self.leader
    }

    pub fn servers(&self) -> &[MemberId] {
        &self.servers
    }

    /// Advance to the next candidate member, or `None` once every member
    /// (leader included) has been yielded once.
    pub fn next(&mut self) -> Option<MemberId> {
        if !self.yielded_leader {
            self.yielded_leader = true;
            if let Some(leader) = self.leader {
                return Some(leader);
            }
        }
        while self.cursor < self.servers.len() {
            let candidate = self.servers[self.cursor];
            self.cursor += 1;
            if Some(candidate) != self.leader {
                return Some(candidate);
            }
        }
        None
    }

    /// Whether another candidate remains in the current rotation.
    pub fn has_next(&self) -> bool {
        if !self.yielded_leader && self.leader.is_some() {
            return true;
        }
        self.servers[self.cursor..].iter().any(|candidate| Some(*candidate) != self.leader)
    }

    /// Rewind to the start of the rotation, e.g. after a successful RPC, so the
    /// next request again prefers the leader.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.yielded_leader = false;
    }

    /// Replace the known leader/member set, e.g. once a `ForwardToLeader`-style
    /// hint arrives, and rewind the rotation.
    pub fn reset_with(&mut self, leader: Option<MemberId>, servers: Vec<MemberId>) {
        self.leader = leader;
        self.servers = servers;
        self.reset();
    }
}
