//! Infrastructure adapters and runtime bootstrap.

pub mod credentials;
pub mod error;
pub mod telemetry;
pub mod transport;
