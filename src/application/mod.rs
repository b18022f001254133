//! Application layer: the promise correlation bridge.
//!
//! `BillingBridge` is the entry point callers talk to. Requests that complete
//! through a collaborator callback park a oneshot completion handle in the
//! `PendingRegistry`; `EventRouter` receives the callbacks and settles the
//! handle for the matching operation class.

pub mod bridge;
pub mod callbacks;
pub mod registry;
