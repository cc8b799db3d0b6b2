//! Infrastructure layer - Backends, stores, caches and the serving pipeline

pub mod backend;
pub mod cache;
pub mod feature;
pub mod logging;
pub mod model;
pub mod observability;
pub mod registry;
pub mod serving;
