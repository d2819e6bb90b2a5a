//! Core types and collaborator traits for the GIAS cache.
//!
//! This crate is deliberately free of database, queue and network
//! dependencies. The reconciliation pipeline (`gias-sync`) and the storage
//! backends (`gias-store-sqlite`) both depend on it.

// Traits are written with `impl Future + Send` signatures so implementors can
// use plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod domain;
pub mod error;
pub mod events;
pub mod mapping;
pub mod model;
pub mod queue;
pub mod source;
pub mod store;

pub use error::{Error, Result};
