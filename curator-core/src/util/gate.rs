//! Counting gate bounding concurrent heavy encodes across files.
//!
//! Pipeline instances for different files may run on separate threads; each
//! acquires a permit before spawning its encoder and releases it on drop.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Debug)]
struct GateState {
    in_flight: usize,
    limit: usize,
}

/// Blocks callers until fewer than `limit` encodes are running.
///
/// Cloning the gate shares the same counter.
#[derive(Debug, Clone)]
pub struct EncodeGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

/// Held while an encode runs; releases its slot when dropped.
#[derive(Debug)]
pub struct EncodePermit {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl EncodeGate {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(GateState {
                    in_flight: 0,
                    limit: limit.max(1),
                }),
                Condvar::new(),
            )),
        }
    }

    /// Waits for headroom and takes a slot.
    pub fn acquire(&self) -> EncodePermit {
        let (lock, available) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight >= state.limit {
            log::info!(
                "Waiting for an encode slot ({} of {} in use)",
                state.in_flight,
                state.limit
            );
        }
        while state.in_flight >= state.limit {
            state = available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight += 1;
        EncodePermit {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of permits currently held, including the caller's.
    pub fn in_flight(&self) -> usize {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(PoisonError::into_inner).in_flight
    }
}

impl Drop for EncodePermit {
    fn drop(&mut self) {
        let (lock, available) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = state.in_flight.saturating_sub(1);
        available.notify_one();
    }
}
