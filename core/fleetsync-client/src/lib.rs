//! Backend clients for the fleetsync dual-write core.
//!
//! Both backing systems expose the same capability set through the
//! [`Backend`] trait:
//! - [`PrimaryClient`] talks to the IoT platform REST API (things, channels,
//!   connections, token authentication)
//! - [`SecondaryClient`] talks to the database-backed backup API
//! - [`mock::MockBackend`] is an in-memory stand-in for tests
//!
//! The orchestrator never inspects which concrete system it is calling; it
//! only sees success with a JSON payload, or a [`ClientError`].

mod backend;
mod error;
mod http;
pub mod mock;
mod primary;
mod secondary;

pub use backend::{Backend, ListFilters};
pub use error::{ClientError, ClientResult};
pub use primary::{PrimaryClient, PrimaryConfig};
pub use secondary::{SecondaryClient, SecondaryConfig};
