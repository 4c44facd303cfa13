//! Request/command sequencing: de-duplication, out-of-order admission, and
//! result memoization (spec §4.7, §8 P1).

use crate::{AppData, AppDataResponse, AppEvent};

use super::SessionContext;

pub(crate) struct PendingEntry<D> {
    pub sequence: u64,
    pub operation: D,
}

/// The outcome of submitting a command at a given sequence number.
#[derive(Debug)]
pub enum CommandAdmission<D, R> {
    /// `sequence` is exactly one past the last applied command: apply `operation` now.
    Apply(D),
    /// `sequence` is ahead of what may be applied yet; stashed until its
    /// predecessors arrive.
    Deferred,
    /// A retransmission of a command whose result is still cached.
    Cached(R),
    /// A retransmission of a command whose result has already been garbage
    /// collected (or that never existed) — return "cached result not available".
    Expired,
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> SessionContext<D, R, E> {
    /// Advance the client-chosen request sequence high-water mark. Tolerant of
    /// gaps — unlike command sequencing, request numbers are never drained or
    /// replayed in order, only tracked for staleness detection.
    pub fn update_request_sequence(&mut self, sequence: u64) {
        self.request_sequence = self.request_sequence.max(sequence);
    }

    /// Re-arm the request sequence watermark when a new leader bootstraps this
    /// session from already-applied state.
    pub fn reset_request_sequence(&mut self, sequence: u64) {
        self.request_sequence = self.request_sequence.max(sequence);
    }

    pub fn request_sequence(&self) -> u64 {
        self.request_sequence
    }

    pub fn command_sequence(&self) -> u64 {
        self.command_sequence
    }

    pub fn command_low_water_mark(&self) -> u64 {
        self.command_low_water_mark
    }

    /// Admit a command at `sequence`, either handing it back for immediate
    /// application, stashing it for later, or resolving it from the result cache.
    pub fn admit_command(&mut self, sequence: u64, operation: D) -> CommandAdmission<D, R> {
        if let Some(result) = self.results.get(&sequence) {
            return CommandAdmission::Cached(result.clone());
        }
        if sequence <= self.command_sequence {
            return CommandAdmission::Expired;
        }
        if sequence == self.command_sequence + 1 {
            return CommandAdmission::Apply(operation);
        }
        tracing::debug!(
            session = %self.id(),
            sequence,
            command_sequence = self.command_sequence,
            "command arrived out of order, stashing until its predecessors apply"
        );
        self.pending_commands.insert(
            sequence,
            PendingEntry {
                sequence,
                operation,
            },
        );
        CommandAdmission::Deferred
    }

    /// Record that `sequence` has been applied with `result`, advance the
    /// command sequence (firing any sequence-gated queries up to it), and
    /// return the next pending command, if its predecessor just arrived.
    pub fn complete_command(&mut self, sequence: u64, result: R) -> Option<(u64, D)> {
        self.set_command_sequence(sequence);
        self.results.insert(sequence, result);
        self.pending_commands
            .remove(&(sequence + 1))
            .map(|entry| (entry.sequence, entry.operation))
    }

    /// Garbage collect cached results at or below `sequence`, advancing the
    /// command low-water mark. Invoked once a client acknowledges it will never
    /// retransmit commands at or below this sequence (spec §4.7).
    pub fn clear_results(&mut self, sequence: u64) {
        if sequence <= self.command_low_water_mark {
            return;
        }
        self.command_low_water_mark = sequence;
        self.results.retain(|&applied, _| applied > sequence);
    }

    pub(crate) fn set_command_sequence(&mut self, sequence: u64) {
        if sequence <= self.command_sequence {
            return;
        }
        let from = self.command_sequence;
        self.command_sequence = sequence;
        super::gates::advance(&mut self.sequence_queries, from, sequence);
    }
}
