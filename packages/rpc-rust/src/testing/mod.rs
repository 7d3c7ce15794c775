//! `Dummy` fixtures: an in-memory controller, its command set and typed clients.
//!
//! Used by the end-to-end tests and the `dummy-server` binary.

pub mod clients;
pub mod dummy;
#[cfg(test)]
mod scenarios;

pub use clients::{DummyClient, DummyCommandableHttpClient, DummyDirectClient};
pub use dummy::{dummy_schema, sub_dummy_schema, Dummy, DummyController, SubDummy};
