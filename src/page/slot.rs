//! Compute-once cache slot with sticky failures
//!
//! A slot holds one generation at a time. The generation's `OnceCell` makes
//! concurrent first callers share a single computation; its result, success
//! or failure, is kept until the slot is reset. Resetting swaps in a fresh
//! generation, so work still running against the old one lands in a cell
//! nobody reads any more.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;

use crate::error::PageError;

/// Observable state of a slot
#[derive(Debug, Clone)]
pub enum SlotState<T> {
    Unloaded,
    Loading,
    Ready(T),
    Failed(PageError),
}

struct Generation<T> {
    cell: OnceCell<Result<T, PageError>>,
    in_flight: AtomicUsize,
}

impl<T> Generation<T> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            in_flight: AtomicUsize::new(0),
        }
    }
}

/// Marks a computation as running for as long as it is alive
///
/// Dropped on completion and on cancellation alike.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct Slot<T> {
    current: RwLock<Arc<Generation<T>>>,
}

impl<T: Clone> Slot<T> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Generation::new())),
        }
    }

    fn generation(&self) -> Arc<Generation<T>> {
        self.current.read().clone()
    }

    /// Return the cached result, running `init` if nobody has yet
    ///
    /// Callers arriving while `init` runs wait for it instead of starting
    /// their own. If the running caller is dropped, the next waiter takes
    /// over.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<T, PageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PageError>>,
    {
        let generation = self.generation();
        let counter = &generation.in_flight;
        generation
            .cell
            .get_or_init(|| async move {
                let _running = InFlight::enter(counter);
                init().await
            })
            .await
            .clone()
    }

    /// Cached result without waiting or computing
    pub fn peek(&self) -> Option<Result<T, PageError>> {
        self.generation().cell.get().cloned()
    }

    pub fn state(&self) -> SlotState<T> {
        let generation = self.generation();
        match generation.cell.get() {
            Some(Ok(value)) => SlotState::Ready(value.clone()),
            Some(Err(e)) => SlotState::Failed(e.clone()),
            None if generation.in_flight.load(Ordering::Acquire) > 0 => SlotState::Loading,
            None => SlotState::Unloaded,
        }
    }

    /// Forget the cached result, success or failure
    pub fn reset(&self) {
        *self.current.write() = Arc::new(Generation::new());
    }

    /// Forget the cached result only if it is a success
    ///
    /// Returns whether anything was dropped.
    pub fn reset_ready(&self) -> bool {
        let mut current = self.current.write();
        if matches!(current.cell.get(), Some(Ok(_))) {
            *current = Arc::new(Generation::new());
            true
        } else {
            false
        }
    }
}

impl<T: Clone> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}
