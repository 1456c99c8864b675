//! Concurrent re-keying of time-ordered flow records
//!
//! Raw records are scanned from a time-keyed [`SourceStore`] over an interval,
//! reshaped into flow-keyed fragments, and merged into a [`FlowStore`] where
//! every flow key accumulates its fragments in arrival order.
//!
//! ## Core Concepts
//!
//! - **RangePartitioner**: splits the interval into contiguous partitions
//! - **RangeScanner**: pages through one partition, each key exactly once
//! - **reshape**: pure page to [`Accumulation`] transform driven by the [`SchemaRegistry`]
//! - **MergeWriter**: appends accumulations to the destination in atomic batches
//! - **Pipeline**: runs scanners and writers over bounded queues

pub mod destination;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod reshape;
pub mod scanner;
pub mod schema;
pub mod source;
pub mod writer;

pub use destination::FlowStore;
pub use error::{ParseError, PipelineError, RangeError, SchemaError, SubprocessError};
pub use metrics::PipelineReport;
pub use pipeline::{Dispatch, Pipeline, PipelineConfig};
pub use reshape::Accumulation;
pub use schema::{AddressFamily, SchemaConfig, SchemaRegistry};
pub use source::{MemorySource, SourceStore, StoreSource};
