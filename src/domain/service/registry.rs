//! Configuration collaborator contract

use std::sync::Arc;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::ServiceConfig;
use crate::domain::recommend::ServiceId;
use crate::domain::DomainError;

/// Connection details for subscribing to a service's configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConn {
    pub service: ServiceId,
    pub host: String,
    pub port: u16,
}

/// Supplies per-service configuration and live-update subscriptions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Current configuration for a data-id
    fn lookup(&self, data_id: &str) -> Option<Arc<ServiceConfig>>;

    /// Subscribes to configuration changes for a service; must be idempotent
    async fn ensure_listening(&self, conn: &ListenerConn) -> Result<(), DomainError>;
}

/// Notified after a service's configuration was refreshed
#[async_trait]
pub trait ReloadListener: Send + Sync {
    async fn on_reload(&self, service: Arc<ServiceConfig>) -> Result<(), DomainError>;
}
