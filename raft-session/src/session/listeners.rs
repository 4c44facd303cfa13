use std::sync::{Arc, Mutex};

use crate::ids::SessionId;
use crate::session::SessionState;

/// Notified on every distinct state transition a session makes (spec §4.5).
pub trait SessionListener: Send + Sync {
    fn on_state_change(&self, session: SessionId, state: SessionState);
}

/// A snapshot-before-iteration registry of listeners.
///
/// Listeners may themselves add or remove listeners in response to a
/// notification; cloning the registered set before firing keeps that from
/// deadlocking or skipping entries, at the cost of an extra `Arc` clone per
/// notification (spec §9).
#[derive(Clone, Default)]
pub(crate) struct Listeners(Arc<Mutex<Vec<Arc<dyn SessionListener>>>>);

impl Listeners {
    pub fn add(&self, listener: Arc<dyn SessionListener>) {
        self.0.lock().unwrap().push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn SessionListener>) {
        self.0.lock().unwrap().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn notify(&self, session: SessionId, state: SessionState) {
        let snapshot = self.0.lock().unwrap().clone();
        for listener in snapshot.iter() {
            listener.on_state_change(session, state);
        }
    }
}
