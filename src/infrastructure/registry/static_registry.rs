//! In-process service registry
//!
//! Holds the configured services, remembers which data-ids have been
//! subscribed to, and fans reload notifications out to registered listeners.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::service::{ListenerConn, ReloadListener, ServiceConfig, ServiceRegistry};
use crate::domain::DomainError;

#[derive(Default)]
pub struct StaticServiceRegistry {
    services: RwLock<HashMap<String, Arc<ServiceConfig>>>,
    subscribed: RwLock<HashSet<String>>,
    listeners: Vec<Arc<dyn ReloadListener>>,
}

impl std::fmt::Debug for StaticServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticServiceRegistry")
            .field("services", &self.data_ids())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl StaticServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn ReloadListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Adds or replaces a service
    pub fn insert(&self, service: ServiceConfig) {
        let data_id = service.service_id().to_string();
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(data_id, Arc::new(service));
    }

    pub fn data_ids(&self) -> Vec<String> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = services.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_subscribed(&self, data_id: &str) -> bool {
        self.subscribed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(data_id)
    }

    /// Tells every listener that a service's configuration changed
    ///
    /// Every listener runs even if an earlier one fails; the first error is
    /// returned.
    pub async fn notify_reload(&self, data_id: &str) -> Result<(), DomainError> {
        let service = self.lookup(data_id).ok_or_else(|| {
            DomainError::not_found(format!("No configuration for service '{}'", data_id))
        })?;

        let mut first_error = None;

        for listener in &self.listeners {
            if let Err(e) = listener.on_reload(service.clone()).await {
                warn!(data_id = %data_id, error = %e, "Reload listener failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(data_id = %data_id, "Service configuration reloaded");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ServiceRegistry for StaticServiceRegistry {
    fn lookup(&self, data_id: &str) -> Option<Arc<ServiceConfig>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(data_id)
            .cloned()
    }

    async fn ensure_listening(&self, conn: &ListenerConn) -> Result<(), DomainError> {
        let data_id = &conn.service.data_id;

        if self.lookup(data_id).is_none() {
            return Err(DomainError::not_found(format!(
                "No configuration for service '{}'",
                data_id
            )));
        }

        let newly_subscribed = self
            .subscribed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(data_id.clone());

        if newly_subscribed {
            info!(
                service = %conn.service,
                host = %conn.host,
                port = conn.port,
                "Subscribed to service configuration"
            );

            // Initial load; a missing filter only means "maybe present"
            if let Err(e) = self.notify_reload(data_id).await {
                warn!(data_id = %data_id, error = %e, "Initial reload failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::filter::{FilterSettings, MembershipFilters, MockIdSource};
    use crate::domain::recommend::ServiceId;

    #[derive(Debug, Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReloadListener for CountingListener {
        async fn on_reload(&self, _service: Arc<ServiceConfig>) -> Result<(), DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn conn(data_id: &str) -> ListenerConn {
        ListenerConn {
            service: ServiceId::new(data_id, "DEFAULT_GROUP", "public"),
            host: "127.0.0.1".to_string(),
            port: 8848,
        }
    }

    #[tokio::test]
    async fn test_first_subscription_triggers_initial_reload() {
        let listener = Arc::new(CountingListener::default());
        let registry = StaticServiceRegistry::new().with_listener(listener.clone());
        registry.insert(ServiceConfig::for_tests("rec-home"));

        registry.ensure_listening(&conn("rec-home")).await.unwrap();
        registry.ensure_listening(&conn("rec-home")).await.unwrap();

        assert!(registry.is_subscribed("rec-home"));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_service_cannot_be_subscribed() {
        let registry = StaticServiceRegistry::new();

        let err = registry.ensure_listening(&conn("missing")).await.unwrap_err();

        assert!(err.is_configuration());
        assert!(!registry.is_subscribed("missing"));
    }

    #[tokio::test]
    async fn test_reload_rebuilds_membership_filters() {
        let source = Arc::new(MockIdSource::new().with_ids("users", &["u1"]).with_ids("items", &["i1"]));
        let filters = Arc::new(MembershipFilters::new(FilterSettings::default()));
        let registry = StaticServiceRegistry::new().with_listener(filters.clone());
        registry.insert(ServiceConfig::for_tests("rec-home").with_id_source(source.clone()));

        registry.notify_reload("rec-home").await.unwrap();
        assert!(filters.view("rec-home").might_contain_user("u1"));
        assert!(!filters.view("rec-home").might_contain_user("u2"));

        source.set_ids("users", &["u2"]);
        registry.notify_reload("rec-home").await.unwrap();
        assert!(filters.view("rec-home").might_contain_user("u2"));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_filter() {
        let filters = Arc::new(MembershipFilters::new(FilterSettings::default()));
        let registry = StaticServiceRegistry::new().with_listener(filters.clone());
        registry.insert(
            ServiceConfig::for_tests("rec-home").with_id_source(Arc::new(MockIdSource::failing())),
        );

        assert!(registry.notify_reload("rec-home").await.is_err());
        assert!(!filters.view("rec-home").is_loaded());
    }
}
