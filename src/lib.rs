// Library for the sender and collector binaries (and tests)

pub mod aggregator;
pub mod config;
pub mod logging;
pub mod models;
pub mod routes;
pub mod sampler;
pub mod stats_source;
pub mod storage;
pub mod transmitter;
pub mod version;
