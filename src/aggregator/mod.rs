//! Aggregation pass
//!
//! Fetches every provider concurrently, classifies the results and derives
//! the pass's alerts into one immutable [`AggregatedReport`](crate::domain::AggregatedReport).

pub mod alerts;
pub mod assembler;

pub use alerts::{derive_alerts, AlertPolicy, ThresholdRule};
pub use assembler::{AssemblerConfig, SnapshotAssembler};
