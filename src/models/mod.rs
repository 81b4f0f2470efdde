// Domain models: raw samples, aggregated records, wire batch

mod batch;
mod record;
mod sample;

pub use batch::{Batch, FieldValue, Point, Tags, ValidationError, batch_from_records, parse_batch};
pub use record::{CpuUsage, Measurement, MemoryUsage, MetricRecord, NetworkUsage};
pub use sample::{ContainerRef, NetworkCounters, RawSample};
