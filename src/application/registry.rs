use crate::domain::operation::{OperationClass, Rejection, Resolution, Settlement};
use crate::error::{BillingError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Sending half of a caller's pending request. Settles at most once.
#[derive(Debug)]
pub struct CompletionHandle {
    sender: oneshot::Sender<Settlement>,
}

/// Receiving half held by the caller.
#[derive(Debug)]
pub struct PendingCompletion {
    class: OperationClass,
    receiver: oneshot::Receiver<Settlement>,
}

impl CompletionHandle {
    pub fn new(class: OperationClass) -> (Self, PendingCompletion) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, PendingCompletion { class, receiver })
    }

    fn settle(self, class: OperationClass, settlement: Settlement) {
        if self.sender.send(settlement).is_err() {
            tracing::debug!(operation = %class, "caller stopped waiting before the operation settled");
        }
    }
}

impl PendingCompletion {
    pub fn class(&self) -> OperationClass {
        self.class
    }

    /// Waits for the handle to settle.
    ///
    /// A handle discarded by [`PendingRegistry::clear`] never settles; the
    /// wait then ends with [`BillingError::Abandoned`].
    pub async fn wait(self) -> Result<Resolution> {
        match self.receiver.await {
            Ok(Ok(resolution)) => Ok(resolution),
            Ok(Err(rejection)) => Err(rejection.into()),
            Err(_) => Err(BillingError::Abandoned(self.class)),
        }
    }
}

/// Pending completion handles keyed by operation class.
///
/// A class is present iff an operation of that class is outstanding. All
/// operations go through one lock, so a callback racing a new request for the
/// same class cannot double-settle a handle.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    handles: Mutex<HashMap<OperationClass, CompletionHandle>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<OperationClass, CompletionHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `handle` iff no handle is pending for `class`. The existing
    /// handle is left untouched on failure.
    pub fn put(&self, class: OperationClass, handle: CompletionHandle) -> bool {
        let mut handles = self.handles();
        if handles.contains_key(&class) {
            tracing::warn!(operation = %class, "tried to put handle, but one is already pending");
            return false;
        }
        handles.insert(class, handle);
        true
    }

    /// Creates a handle for `class` and registers it, returning the caller's
    /// half, or `None` when `class` is already pending.
    pub fn register(&self, class: OperationClass) -> Option<PendingCompletion> {
        let (handle, pending) = CompletionHandle::new(class);
        self.put(class, handle).then_some(pending)
    }

    pub fn resolve(&self, class: OperationClass, value: Resolution) {
        self.settle(class, Ok(value));
    }

    pub fn reject(&self, class: OperationClass, rejection: Rejection) {
        self.settle(class, Err(rejection));
    }

    fn settle(&self, class: OperationClass, settlement: Settlement) {
        let removed = self.handles().remove(&class);
        match removed {
            Some(handle) => handle.settle(class, settlement),
            None => {
                tracing::warn!(operation = %class, "tried to settle handle, but none is pending");
            }
        }
    }

    pub fn has(&self, class: OperationClass) -> bool {
        self.handles().contains_key(&class)
    }

    /// Drops every pending handle without settling it.
    pub fn clear(&self) {
        let mut handles = self.handles();
        if !handles.is_empty() {
            tracing::debug!(abandoned = handles.len(), "clearing pending handles");
        }
        handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }
}
