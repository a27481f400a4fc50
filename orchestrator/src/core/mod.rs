//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod agent_pool;
pub mod chunking;
pub mod ids;
pub mod plan;
pub mod queue;
pub mod types;
