//! Domain types, structured errors, configuration helpers, and resilience
//! primitives shared across the control plane's components.
//!
//! # Modules
//! - [`domain`]: `Instance`, `DeclaredConfiguration`, `RuntimeInfo`,
//!   `Command`, `Event`, `Response`, the status ring, and the audit log.
//! - [`error`]: the `ControlError`/`ControlResult` pair every component
//!   converges its failures into.
//! - [`resilience`]: the generic circuit breaker state machine.
//! - [`patch`]: the RFC-6902-like JSON Patch engine used for declared
//!   configuration updates.
//! - [`logging`]: tracing subscriber bootstrap.

pub mod domain;
pub mod error;
pub mod logging;
pub mod patch;
pub mod resilience;

pub use error::{ControlError, ControlResult};
