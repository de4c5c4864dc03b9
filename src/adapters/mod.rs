//! Port implementations.
//!
//! `live` talks to the directory, mail and blob services over HTTP, `local`
//! keeps stores, sites, the directory and an outbox under a data directory,
//! and `memory` holds everything in process for tests.

pub mod live;
pub mod local;
pub mod memory;
