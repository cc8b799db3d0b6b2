//! Feature domain - Serialized feature records and how they are assembled

mod record;
mod sample;
mod store;

pub use record::{ExampleFeatures, FeatureRecord};
pub use sample::{SampleContext, SampleStrategy};
pub use store::FeatureStore;

#[cfg(test)]
pub use store::mock::MockFeatureStore;
