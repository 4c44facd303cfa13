//! Ordered, replayable event publication (spec §4.6).

use std::cmp;

use crate::protocol::PublishRequest;
use crate::service::OperationKind;
use crate::{AppData, AppDataResponse, AppEvent};

use super::SessionContext;

/// A run of events produced while applying a single log entry, anchored to the
/// index of that entry and the index of the batch immediately before it.
#[derive(Clone, Debug)]
pub struct EventBatch<E> {
    pub event_index: u64,
    pub previous_index: u64,
    pub events: Vec<E>,
}

impl<D: AppData, R: AppDataResponse, E: AppEvent> SessionContext<D, R, E> {
    /// Append `event` to the batch for the entry currently being applied.
    ///
    /// Valid only while a command is being applied on the service's own
    /// executor and the session is open (spec §4.6). If the service's current
    /// index has already been completed on this session — a stale
    /// re-application after a leadership change — the event is silently
    /// dropped rather than resurrected out of order.
    pub fn publish(&mut self, event: E) -> Result<(), crate::error::SessionError> {
        if self.state != super::SessionState::Open {
            return Err(crate::error::SessionError::Invariant("publish on a non-open session"));
        }
        if self.service.current_operation() != OperationKind::Command {
            return Err(crate::error::SessionError::Invariant(
                "publish outside of command application",
            ));
        }
        let current_index = self.service.current_index();
        if self.complete_index > current_index {
            return Ok(());
        }
        let needs_new_batch = match &self.current_event_batch {
            Some(batch) => batch.event_index != current_index,
            None => true,
        };
        if needs_new_batch {
            let previous_index = self.event_index;
            self.event_index = current_index;
            self.current_event_batch = Some(EventBatch {
                event_index: current_index,
                previous_index,
                events: Vec::new(),
            });
        }
        self.current_event_batch.as_mut().unwrap().events.push(event);
        Ok(())
    }

    /// Called when the entry that may have produced an open event batch commits.
    /// If the open batch was produced at `index`, it is enqueued and sent;
    /// otherwise it is left open for a later commit.
    pub fn commit(&mut self, index: u64) {
        if let Some(batch) = &self.current_event_batch {
            if batch.event_index == index {
                let batch = self.current_event_batch.take().unwrap();
                tracing::debug!(session = %self.id, index, events = batch.events.len(), "enqueueing committed event batch");
                self.events.push_back(batch.clone());
                self.send_events(batch);
            }
        }
        self.set_last_applied(index);
    }

    /// Transmit `batch` to the client, unless this server no longer believes
    /// itself to be the leader (spec §4.6: "a no-op when not leader").
    pub(crate) fn send_events(&self, batch: EventBatch<E>) {
        if !self.server.is_leader() {
            return;
        }
        let member = match self.connection {
            Some(member) => member,
            None => return,
        };
        let request = PublishRequest {
            session: self.id.as_u64(),
            event_index: batch.event_index,
            previous_index: cmp::max(batch.previous_index, self.complete_index),
            events: batch.events,
        };
        let protocol = self.server.protocol();
        let executor = self.service.executor();
        executor.spawn(Box::pin(async move {
            protocol.publish(member, request).await;
        }));
    }

    /// Remove queued batches at or below `index`, advance `completeIndex`
    /// accordingly, and re-send every batch still queued (spec §4.6,
    /// "clearEvents").
    pub fn clear_events(&mut self, index: u64) {
        tracing::debug!(session = %self.id, index, "client reset: clearing acknowledged event batches");
        while let Some(front) = self.events.front() {
            if front.event_index <= index {
                self.events.pop_front();
            } else {
                break;
            }
        }
        self.complete_index = cmp::max(self.complete_index, index);
        let remaining: Vec<EventBatch<E>> = self.events.iter().cloned().collect();
        for batch in remaining {
            self.send_events(batch);
        }
    }

    /// The highest event index the client is known to have fully received,
    /// used to answer keep-alive and metadata queries.
    pub fn last_completed(&self) -> u64 {
        match self.events.front() {
            Some(batch) => batch.event_index.saturating_sub(1),
            None => self.last_applied,
        }
    }

    pub(crate) fn set_last_applied(&mut self, index: u64) {
        if index <= self.last_applied {
            return;
        }
        let from = self.last_applied;
        self.last_applied = index;
        super::gates::advance(&mut self.index_queries, from, index);
    }
}
