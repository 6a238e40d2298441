//! Resolution cache
//!
//! Memoizes resolved graphs by [`Fingerprint`]. At most one resolution runs per
//! fingerprint; concurrent callers for the same fingerprint wait on that
//! fingerprint's slot only and share its result or its failure. Failed slots
//! are dropped once the failure has been handed out, so a later caller
//! resolves again.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::fingerprint::Fingerprint;
use super::resolved::ResolvedGraph;
use super::ResolveError;

type Outcome = Result<Arc<ResolvedGraph>, ResolveError>;

enum SlotState {
    Pending,
    Ready(Outcome),
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn pending() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        }
    }

    fn wait(&self) -> Outcome {
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Ready(outcome) => return outcome.clone(),
                SlotState::Pending => self.ready.wait(&mut state),
            }
        }
    }

    fn publish(&self, outcome: Outcome) {
        *self.state.lock() = SlotState::Ready(outcome);
        self.ready.notify_all();
    }

    fn completed(&self) -> Option<Arc<ResolvedGraph>> {
        match &*self.state.lock() {
            SlotState::Ready(Ok(graph)) => Some(graph.clone()),
            _ => None,
        }
    }
}

/// Shared handle; clones use the same entries
#[derive(Clone, Default)]
pub struct ResolutionCache {
    slots: Arc<Mutex<HashMap<Fingerprint, Arc<Slot>>>>,
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("entries", &self.slots.lock().len())
            .finish()
    }
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached graph for `fingerprint`, running `resolve` if no
    /// caller has produced it yet
    pub fn get_or_resolve<F>(&self, fingerprint: Fingerprint, resolve: F) -> Outcome
    where
        F: FnOnce() -> Result<ResolvedGraph, ResolveError>,
    {
        let (slot, owner) = {
            let mut slots = self.slots.lock();
            match slots.get(&fingerprint) {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot = Arc::new(Slot::pending());
                    slots.insert(fingerprint, slot.clone());
                    (slot, true)
                }
            }
        };

        if !owner {
            tracing::debug!(
                target: "brood::resolve",
                fingerprint = %fingerprint.short(),
                "waiting for cached resolution"
            );
            return slot.wait();
        }

        tracing::debug!(
            target: "brood::resolve",
            fingerprint = %fingerprint.short(),
            "resolving"
        );

        let outcome = match panic::catch_unwind(AssertUnwindSafe(resolve)) {
            Ok(result) => result.map(Arc::new),
            Err(_) => Err(ResolveError::Aborted("resolution panicked".into())),
        };

        if outcome.is_err() {
            let mut slots = self.slots.lock();
            if slots.get(&fingerprint).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                slots.remove(&fingerprint);
            }
        }

        slot.publish(outcome.clone());
        outcome
    }

    /// A completed graph, without waiting or resolving
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<ResolvedGraph>> {
        let slot = self.slots.lock().get(fingerprint).cloned()?;
        slot.completed()
    }

    /// Number of entries, including resolutions in flight
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
