//! Application state shared by the HTTP handlers

use std::sync::Arc;

use crate::domain::CircuitBreakerRegistry;
use crate::infrastructure::registry::StaticServiceRegistry;
use crate::infrastructure::serving::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub registry: Arc<StaticServiceRegistry>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    /// Circuit guarding the primary inference path
    pub circuit_name: String,
}
