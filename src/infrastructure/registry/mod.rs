//! Service registry backed by the application configuration

mod builder;
mod static_registry;

pub use builder::ServiceBuilder;
pub use static_registry::StaticServiceRegistry;
