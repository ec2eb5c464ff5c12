//! # parley-store
//!
//! State store for the Parley messaging backend.
//!
//! All state (accounts, inboxes, groups) lives in one [`Snapshot`] that is
//! rewritten to a JSON file after every successful mutation. The crate
//! exposes a synchronous [`Store`] whose methods are the complete set of
//! operations: authentication, account provisioning, direct messages and
//! group management.

pub mod authz;
pub mod models;
pub mod password;
pub mod persist;
pub mod store;

mod error;

pub use error::{ErrorKind, Result, StoreError};
pub use models::*;
pub use store::{Bootstrap, Store};
