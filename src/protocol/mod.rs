//! Minimal Redis client
//!
//! Just enough of RESP2 to talk to the servers we monitor:
//!
//! - `AUTH` when a password is configured
//! - `PING` for the liveness probe
//! - `INFO` for the statistics collector
//! - `MONITOR` for the live command stream
//!
//! Every [`RedisClient`] is scoped to exactly one server, so connections are
//! never handed out across servers.

pub mod connection;
pub mod error;
pub mod monitor;
pub mod resp;

pub use connection::{RedisClient, RedisConnection};
pub use error::{ProtocolError, ProtocolResult};
pub use monitor::MonitorConnection;
pub use resp::Value;
