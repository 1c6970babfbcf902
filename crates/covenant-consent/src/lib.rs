//! Covenant Consent - live, scoped consent with abort handles.
//!
//! A grant authorizes a set of operation kinds for one agent until it
//! expires, is revoked, or its abort handle is triggered. The abort handle
//! is a shared token: anyone holding a clone can trigger it, and every
//! in-flight consumer observes the change at its next checkpoint.
//!
//! Expiry is lazy. No timers run; the first check after `expires_at` moves
//! the grant to `Expired` for good.

#![deny(unsafe_code)]

mod error;
mod grant;
mod handle;
mod manager;

pub use error::ConsentError;
pub use grant::{ConsentGrant, GrantStatus};
pub use handle::{AbortHandle, AbortHandleId};
pub use manager::{ConsentCheck, ConsentManager};
