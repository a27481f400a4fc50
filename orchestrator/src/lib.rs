//! Chunked task orchestration over a durable, approval-gated queue.
//!
//! A batch of file operations is split into fixed-size chunks (a plan) and
//! each chunk is handed to one logical agent slot, which submits it to the
//! shared task queue and drains it. The queue is persisted after every
//! mutation so an interrupted run can be resumed.
//!
//! - **[`core`]**: Pure state transitions (queue records, plans, agent slots,
//!   chunking, ids). No I/O.
//! - **[`io`]**: Queue file, config, filesystem executor, clock, and
//!   notification delivery.
//!
//! [`store`] couples queue state with persistence and execution; [`scheduler`]
//! runs plans over the agent pool on top of it.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod scheduler;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
