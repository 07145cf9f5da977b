//! API node: declarative CRUD on instance metadata and declared
//! configuration, command dispatch over the bus, and the status ring.
//!
//! # Modules
//! - [`instance_service`]: the core `InstanceService`.
//! - [`config`]: API node configuration.
//! - [`http`] (feature `http`): a thin axum pass-through surface.

pub mod config;
pub mod instance_service;

#[cfg(feature = "http")]
pub mod http;

pub use instance_service::InstanceService;
