mod assign;
mod availability;
mod capacity;
mod conflict;
mod eligibility;
mod error;
mod queries;
mod store;

pub use assign::validate_request;
pub use availability::AvailabilityIndex;
pub use capacity::{CapacityTracker, SeatCheck};
pub use conflict::{is_consecutive, BookedTimes, DayPlan};
pub use eligibility::{is_eligible, prefers_desk};
pub use error::{EngineError, ErrorResponse, StoreError};
pub use store::{InMemoryStore, Store};

use std::sync::Arc;

use crate::model::Ms;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Runs assignment rounds and queries against one store.
///
/// The engine holds no state between calls; everything a run needs is read
/// from the store at the start of that run. Runs for the same desk must be
/// serialized by the caller.
pub struct Engine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: Store> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
