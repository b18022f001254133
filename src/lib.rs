//! Promise-correlation bridge between an application and a device billing
//! service.
//!
//! Requests are answered asynchronously: a request parks a completion handle
//! keyed by its operation class, the billing collaborator later reports back
//! through a callback, and the bridge settles the matching handle.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
