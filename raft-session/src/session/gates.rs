//! Sequence/index-gated query release (spec §4.4).
//!
//! A `QueryGates` map holds, per release key, every callback waiting on that
//! key. Advancing the watermark fires every gate whose key now falls within
//! range in one ordered pass — equivalent to firing gates one unit at a time,
//! but `O(log n + k)` via `BTreeMap::range` rather than iterating every
//! intervening integer (spec §9 design note).

use std::collections::BTreeMap;

/// A deferred callable released once its gating sequence/index is reached.
pub type GateCallback = Box<dyn FnOnce() + Send>;

pub(crate) type GateMap = BTreeMap<u64, Vec<GateCallback>>;

/// Register `callback` to run once `current >= key`, or immediately if it
/// already has.
pub(crate) fn register(gates: &mut GateMap, key: u64, current: u64, callback: GateCallback) {
    if current >= key {
        callback();
    } else {
        gates.entry(key).or_insert_with(Vec::new).push(callback);
    }
}

/// Fire every gate with a key in `(from, to]`, in ascending key order.
pub(crate) fn advance(gates: &mut GateMap, from: u64, to: u64) {
    if to <= from {
        return;
    }
    let ready: Vec<u64> = gates.range((from + 1)..=to).map(|(key, _)| *key).collect();
    for key in ready {
        if let Some(callbacks) = gates.remove(&key) {
            for callback in callbacks {
                callback();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fires_immediately_when_already_satisfied() {
        let mut gates = GateMap::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        register(&mut gates, 3, 5, Box::new(move || { fired2.fetch_add(1, Ordering::SeqCst); }));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(gates.is_empty());
    }

    #[test]
    fn fires_exactly_once_as_watermark_advances_past_key() {
        let mut gates = GateMap::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        register(&mut gates, 5, 2, Box::new(move || { fired2.fetch_add(1, Ordering::SeqCst); }));
        advance(&mut gates, 2, 4);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        advance(&mut gates, 4, 6);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        advance(&mut gates, 6, 8);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
