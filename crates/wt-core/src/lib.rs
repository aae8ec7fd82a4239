//! wt-core: Core abstractions and configuration for webssh-tunnel
//!
//! This crate provides the configuration resolver, the local port probe,
//! the error taxonomy and the [`ActorGroup`] supervisor used by the agent
//! and the CLI.

pub mod actor;
pub mod config;
pub mod error;
pub mod port;

pub use actor::{Actor, ActorGroup, GroupState};
pub use config::{Config, ConfigFlags};
pub use error::{ConfigError, ServiceError, TunnelError};
pub use port::find_available_port;
