//! Message-bus core: a typed publish/subscribe primitive plus a synchronous
//! request/reply primitive layered over a pluggable transport.
//!
//! # Modules
//! - [`transport`]: the `MessageTransport` seam any real pub/sub system
//!   plugs into.
//! - [`in_memory`]: the default in-process transport used for tests and
//!   single-process deployment.
//! - [`envelope`]: the `{request, replyChannel}` wire contract.
//! - [`bus`]: the `Bus` facade applications use.
//! - [`config`]: `BusConfig`, the transport selection a deployment loads.

pub mod bus;
pub mod config;
pub mod envelope;
pub mod in_memory;
pub mod transport;

pub use bus::Bus;
pub use config::BusConfig;
pub use in_memory::InMemoryTransport;
pub use transport::MessageTransport;

pub const CHANNEL_INSTANCE_COMMANDS_PROCESS: &str = "instance.commands.process";
pub const CHANNEL_INSTANCE_COMMANDS_CONTAINER: &str = "instance.commands.container";
pub const CHANNEL_INSTANCE_COMMANDS_POD: &str = "instance.commands.pod";
pub const CHANNEL_INSTANCE_EVENTS: &str = "instance.events";
pub const CHANNEL_STATUS_EVENTS: &str = "status.events";
pub const CHANNEL_CONFIGURATION_EVENTS: &str = "configuration.events";
