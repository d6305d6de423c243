//! # Inference Workers
//!
//! Bounded pool of persistent handles to the LLM CLI. Each worker serializes
//! its own queries; the pool lends workers out as scoped leases with FIFO
//! fairness and guaranteed release.

pub mod pool;
pub mod worker;

pub use pool::{WorkerLease, WorkerPool, WorkerPoolConfig};
pub use worker::{LlmWorker, QueryResponse, WorkerConfig};
