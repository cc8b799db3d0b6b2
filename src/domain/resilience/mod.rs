//! Resilience domain - Circuit breakers guarding backend routes

mod circuit_breaker;
mod registry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitState};
pub use registry::CircuitBreakerRegistry;
