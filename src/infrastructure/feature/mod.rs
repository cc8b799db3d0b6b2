//! Feature store backends and the sample strategies that read them

mod in_memory;
mod redis;
mod sample;

pub use in_memory::InMemoryFeatureStore;
pub use redis::RedisFeatureStore;
pub use sample::{RankSampleStrategy, RecallSampleStrategy, SampleAssembler, SampleRegistry};
