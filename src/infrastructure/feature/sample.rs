//! Recall and rank sample strategies
//!
//! Both strategies share one assembly routine: a cached bundle is returned
//! verbatim, otherwise every entity is checked against the service's
//! membership filter and only possibly-present ids are read from the store.
//! Rank bundles are cached per candidate list, so a hit always holds records
//! for exactly the requested items.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use metrics::counter;
use tracing::{debug, warn};

use crate::domain::cache::FeatureCacheKey;
use crate::domain::feature::{ExampleFeatures, FeatureRecord, SampleContext, SampleStrategy};
use crate::domain::filter::{MembershipFilters, MembershipView};
use crate::domain::recommend::SampleKind;
use crate::domain::service::ServiceConfig;
use crate::domain::DomainError;
use crate::infrastructure::cache::FeatureCache;

/// Shared cache- and filter-gated lookups
#[derive(Debug, Clone)]
pub struct SampleAssembler {
    cache: FeatureCache,
    filters: Arc<MembershipFilters>,
}

impl SampleAssembler {
    pub fn new(cache: FeatureCache, filters: Arc<MembershipFilters>) -> Self {
        Self { cache, filters }
    }

    async fn assemble(
        &self,
        ctx: SampleContext<'_>,
        with_items: bool,
    ) -> Result<ExampleFeatures, DomainError> {
        let user_id = ctx.request.user_id();
        let service_id = ctx.service.service_id();
        let key = if with_items {
            FeatureCacheKey::with_candidates(user_id, service_id, ctx.model_name, ctx.request.items())
        } else {
            FeatureCacheKey::new(user_id, service_id, ctx.model_name)
        };

        if let Some(bundle) = self.cache.get(&key).await {
            debug!(key = %key, "Feature bundle served from cache");
            return Ok(bundle);
        }

        let view = self.filters.view(service_id);

        let user = self.user_record(ctx.service, &view, user_id).await?;
        // No real-time context is supplied upstream yet
        let user_context = FeatureRecord::empty(user_id);

        let bundle = if with_items {
            let items = self
                .item_records(ctx.service, &view, ctx.request.items())
                .await;
            ExampleFeatures::rank(user, user_context, items)
        } else {
            ExampleFeatures::recall(user, user_context)
        };

        self.cache.put(&key, &bundle).await;

        Ok(bundle)
    }

    async fn user_record(
        &self,
        service: &ServiceConfig,
        view: &MembershipView,
        user_id: &str,
    ) -> Result<FeatureRecord, DomainError> {
        if !view.might_contain_user(user_id) {
            counter!("membership_filter_skips_total", "entity" => "user").increment(1);
            return Ok(FeatureRecord::empty(user_id));
        }

        let payload = service.feature_store().get(&service.user_key(user_id)).await?;

        Ok(match payload {
            Some(payload) => FeatureRecord::new(user_id, payload),
            None => FeatureRecord::empty(user_id),
        })
    }

    /// Item lookups run concurrently; output order follows `item_ids`
    async fn item_records(
        &self,
        service: &ServiceConfig,
        view: &MembershipView,
        item_ids: &[String],
    ) -> Vec<FeatureRecord> {
        let lookups = item_ids.iter().map(|item_id| async move {
            if !view.might_contain_item(item_id) {
                counter!("membership_filter_skips_total", "entity" => "item").increment(1);
                return FeatureRecord::empty(item_id.as_str());
            }

            match service.feature_store().get(&service.item_key(item_id)).await {
                Ok(Some(payload)) => FeatureRecord::new(item_id.as_str(), payload),
                Ok(None) => FeatureRecord::empty(item_id.as_str()),
                Err(e) => {
                    warn!(item_id = %item_id, error = %e, "Item feature lookup failed, using empty record");
                    FeatureRecord::empty(item_id.as_str())
                }
            }
        });

        join_all(lookups).await
    }
}

/// Recall stage: user and user-context features only
#[derive(Debug, Clone)]
pub struct RecallSampleStrategy {
    assembler: SampleAssembler,
}

impl RecallSampleStrategy {
    pub fn new(assembler: SampleAssembler) -> Self {
        Self { assembler }
    }
}

#[async_trait]
impl SampleStrategy for RecallSampleStrategy {
    fn kind(&self) -> SampleKind {
        SampleKind::Recall
    }

    async fn assemble(&self, ctx: SampleContext<'_>) -> Result<ExampleFeatures, DomainError> {
        self.assembler.assemble(ctx, false).await
    }
}

/// Rank stage: user, user-context and one record per candidate item
#[derive(Debug, Clone)]
pub struct RankSampleStrategy {
    assembler: SampleAssembler,
}

impl RankSampleStrategy {
    pub fn new(assembler: SampleAssembler) -> Self {
        Self { assembler }
    }
}

#[async_trait]
impl SampleStrategy for RankSampleStrategy {
    fn kind(&self) -> SampleKind {
        SampleKind::Rank
    }

    async fn assemble(&self, ctx: SampleContext<'_>) -> Result<ExampleFeatures, DomainError> {
        self.assembler.assemble(ctx, true).await
    }
}

/// Maps a request kind to the strategy that assembles its features
#[derive(Debug, Clone, Default)]
pub struct SampleRegistry {
    strategies: HashMap<SampleKind, Arc<dyn SampleStrategy>>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the recall and rank strategies sharing one assembler
    pub fn standard(assembler: SampleAssembler) -> Self {
        Self::new()
            .with_strategy(Arc::new(RecallSampleStrategy::new(assembler.clone())))
            .with_strategy(Arc::new(RankSampleStrategy::new(assembler)))
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SampleStrategy>) -> Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    pub fn get(&self, kind: SampleKind) -> Result<Arc<dyn SampleStrategy>, DomainError> {
        self.strategies.get(&kind).cloned().ok_or_else(|| {
            DomainError::configuration(format!("No sample strategy registered for '{}'", kind))
        })
    }
}
