//! # docwire-server
//!
//! TCP front door for docwire.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Wire frame decoding and opcode dispatch
//! - Stub replies for Query/GetMore (empty result sets)
//! - Layered configuration (defaults, YAML file, environment)
//!
//! Decoded requests are logged, not executed; there is no backing store.

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{Config, ConfigError, NetworkConfig};
pub use error::ServerError;
pub use handler::MessageHandler;
pub use server::{Server, ServerConfig};
