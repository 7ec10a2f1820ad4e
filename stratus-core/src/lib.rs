//! Stratus Core
//!
//! Vendor-neutral building blocks for infrastructure providers: resources and
//! their state, attribute schemas, the provider trait, per-operation timeouts
//! and polling for asynchronous cloud operations.

pub mod provider;
pub mod resource;
pub mod schema;
pub mod timeouts;
pub mod wait;
