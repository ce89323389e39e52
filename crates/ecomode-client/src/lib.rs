//! ecomode-client — control-plane access for review app eco mode.
//!
//! Defines the domain types exchanged with the hosting platform (apps,
//! container formations, asynchronous operations), the [`ControlPlane`]
//! capability the scaler is written against, and [`ScalingoClient`], the
//! REST implementation of that capability.
//!
//! # Architecture
//!
//! ```text
//! ControlPlane (trait)
//!   ├── authenticate(credential, api_url) → AuthToken
//!   ├── list_apps(token)                  → Vec<App>
//!   ├── scale(token, app, formation)      → Option<Operation>
//!   └── refresh(token, operation)         → Operation
//!
//! ScalingoClient ── reqwest ──▶ auth.scalingo.com / api.<region>.scalingo.com
//! ```
//!
//! HTTP-level failures surface as [`ClientError::Api`], which carries the
//! status code and the `error` field of the response body.

pub mod client;
pub mod error;
pub mod scalingo;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::ControlPlane;
pub use error::{ClientError, ClientResult};
pub use scalingo::ScalingoClient;
pub use types::*;
