//! I/O adapters: configuration, the durable queue file, task effects, and
//! notification delivery.

pub mod clock;
pub mod config;
pub mod executor;
pub mod notify;
pub mod queue_file;
