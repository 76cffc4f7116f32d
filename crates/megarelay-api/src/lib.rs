//! HTTP surface for the MEGA relay.
//!
//! Exposed as a library so integration tests can assemble the router
//! in-process; the `megarelay-api` binary is a thin wrapper over `setup`.

pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod utils;
