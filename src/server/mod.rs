//! Accept loop and bookkeeping of live connections.

pub mod listener;
pub mod registry;

pub use registry::{ConnectionInfo, ConnectionRegistry};
