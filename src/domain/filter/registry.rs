//! Per-service membership filters, replaced wholesale on reload

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::info;

use super::BloomFilter;
use crate::domain::service::{ReloadListener, ServiceConfig};
use crate::domain::DomainError;

/// Sizing for filters built on reload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub expected_items: usize,
    pub false_positive_rate: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            expected_items: 1_000_000,
            false_positive_rate: 0.001,
        }
    }
}

/// User and item filters of one service
#[derive(Debug, Clone)]
pub struct FilterSet {
    users: BloomFilter,
    items: BloomFilter,
}

impl FilterSet {
    pub fn new(users: BloomFilter, items: BloomFilter) -> Self {
        Self { users, items }
    }

    pub fn users(&self) -> &BloomFilter {
        &self.users
    }

    pub fn items(&self) -> &BloomFilter {
        &self.items
    }
}

/// Read-only view used while serving one request
///
/// Holds the snapshot taken at the start of the request, so a concurrent
/// reload never shows the request a half-built filter. A service without a
/// loaded filter answers "maybe present" for every id.
#[derive(Debug, Clone, Default)]
pub struct MembershipView {
    set: Option<Arc<FilterSet>>,
}

impl MembershipView {
    pub fn new(set: Option<Arc<FilterSet>>) -> Self {
        Self { set }
    }

    /// View with no filter loaded: nothing can be proven absent
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn might_contain_user(&self, user_id: &str) -> bool {
        self.set.as_ref().is_none_or(|set| set.users.test(user_id))
    }

    pub fn might_contain_item(&self, item_id: &str) -> bool {
        self.set.as_ref().is_none_or(|set| set.items.test(item_id))
    }

    pub fn is_loaded(&self) -> bool {
        self.set.is_some()
    }
}

/// Registry of filter sets keyed by data-id
#[derive(Debug, Default)]
pub struct MembershipFilters {
    settings: FilterSettings,
    sets: RwLock<HashMap<String, Arc<FilterSet>>>,
}

impl MembershipFilters {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            settings,
            sets: RwLock::new(HashMap::new()),
        }
    }

    pub fn view(&self, data_id: &str) -> MembershipView {
        let sets = self.sets.read().unwrap_or_else(PoisonError::into_inner);
        MembershipView::new(sets.get(data_id).cloned())
    }

    /// Swaps in a new filter set for `data_id`
    pub fn replace(&self, data_id: impl Into<String>, set: FilterSet) {
        let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
        sets.insert(data_id.into(), Arc::new(set));
    }

    /// Rebuilds both filters of a service from its id source
    ///
    /// The new set is built completely before it is published; on error the
    /// previous set stays in place.
    pub async fn reload(&self, service: &ServiceConfig) -> Result<(), DomainError> {
        let model = service.model();
        let source = service.id_source();

        let user_ids = source.load_ids(&model.user_ids_key).await?;
        let item_ids = source.load_ids(&model.item_ids_key).await?;

        let users = BloomFilter::from_ids(
            &user_ids,
            self.settings.expected_items,
            self.settings.false_positive_rate,
        );
        let items = BloomFilter::from_ids(
            &item_ids,
            self.settings.expected_items,
            self.settings.false_positive_rate,
        );

        self.replace(service.id().data_id.clone(), FilterSet::new(users, items));

        info!(
            data_id = %service.id().data_id,
            users = user_ids.len(),
            items = item_ids.len(),
            "Membership filters reloaded"
        );

        Ok(())
    }
}

#[async_trait]
impl ReloadListener for MembershipFilters {
    async fn on_reload(&self, service: Arc<ServiceConfig>) -> Result<(), DomainError> {
        self.reload(&service).await
    }
}
