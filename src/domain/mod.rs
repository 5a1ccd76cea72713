//! Domain errors shared by the application layer.

pub mod error;
