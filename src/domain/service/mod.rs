//! Service domain - Per-service configuration and the registry that owns it

mod config;
mod registry;

pub use config::{ModelConfig, ServiceConfig};
pub use registry::{ListenerConn, ReloadListener, ServiceRegistry};

#[cfg(test)]
pub use registry::MockServiceRegistry;
