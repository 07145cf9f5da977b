//! Platform worker: drives one platform kind (process, container, or pod)
//! by composing a command consumer loop and a health monitor loop.
//!
//! # Modules
//! - [`driver`]: the `PlatformDriver` capability contract.
//! - [`process_driver`], [`container_driver`], [`pod_driver`]: the three
//!   platform backends.
//! - [`port_allocator`]: the shared port pool used by process/container
//!   drivers.
//! - [`command_consumer`]: dispatches bus commands to a driver.
//! - [`health_monitor`]: periodic liveness polling.
//! - [`config`]: worker configuration.

pub mod command_consumer;
pub mod config;
pub mod container_driver;
pub mod driver;
pub mod health_monitor;
pub mod pod_driver;
pub mod port_allocator;
pub mod process_driver;

pub use command_consumer::CommandConsumer;
pub use driver::PlatformDriver;
pub use port_allocator::PortAllocator;
