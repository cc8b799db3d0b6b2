//! Concurrent formatting of raw backend results

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::domain::recommend::{RawScoredItem, ScoredItem};

type Formatter = fn(&RawScoredItem) -> Result<ScoredItem, String>;

/// Rounds to four decimal places
fn round4(score: f64) -> f32 {
    ((score * 10_000.0).round() / 10_000.0) as f32
}

fn format_item(raw: &RawScoredItem) -> Result<ScoredItem, String> {
    if !raw.score.is_finite() {
        return Err(format!("non-finite score {}", raw.score));
    }

    Ok(ScoredItem {
        item_id: raw.item_id.clone(),
        score: round4(raw.score),
    })
}

/// Turns N raw items into exactly N response items
///
/// Each item is formatted by its own task, at most `max_workers` at a time.
/// A faulting item keeps its id with a score of `0.0`. Output order is
/// unspecified.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    max_workers: usize,
    format: Formatter,
}

impl ResultAggregator {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            format: format_item,
        }
    }

    #[cfg(test)]
    fn with_formatter(mut self, format: Formatter) -> Self {
        self.format = format;
        self
    }

    pub async fn aggregate(&self, raw: Vec<RawScoredItem>) -> Vec<ScoredItem> {
        let total = raw.len();
        let permits = Arc::new(Semaphore::new(self.max_workers));
        // Dropping the set on early return aborts any worker still running
        let mut workers = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);

        for item in raw {
            let permits = permits.clone();
            let format = self.format;
            let item_id = item.item_id.clone();

            let handle = workers.spawn(async move {
                let _permit = permits.acquire_owned().await;

                let outcome = AssertUnwindSafe(async { format(&item) }).catch_unwind().await;

                match outcome {
                    Ok(Ok(scored)) => scored,
                    Ok(Err(reason)) => {
                        warn!(item_id = %item.item_id, %reason, "Item could not be formatted, scoring 0");
                        ScoredItem {
                            item_id: item.item_id,
                            score: 0.0,
                        }
                    }
                    Err(_) => {
                        error!(item_id = %item.item_id, "Item formatting panicked, scoring 0");
                        ScoredItem {
                            item_id: item.item_id,
                            score: 0.0,
                        }
                    }
                }
            });

            pending.insert(handle.id(), item_id);
        }

        let mut formatted = Vec::with_capacity(total);

        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((id, item)) => {
                    pending.remove(&id);
                    formatted.push(item);
                }
                Err(e) => {
                    error!(error = %e, "Aggregation worker failed, scoring 0");
                    if let Some(item_id) = pending.remove(&e.id()) {
                        formatted.push(ScoredItem { item_id, score: 0.0 });
                    }
                }
            }
        }

        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(n: usize) -> Vec<RawScoredItem> {
        (0..n)
            .map(|i| RawScoredItem::new(format!("i{}", i), 0.123456 + i as f64))
            .collect()
    }

    fn sorted(mut items: Vec<ScoredItem>) -> Vec<ScoredItem> {
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        items
    }

    #[tokio::test]
    async fn test_every_item_produces_one_output() {
        let items = ResultAggregator::new(4).aggregate(raw(50)).await;

        assert_eq!(items.len(), 50);
        let mut ids: Vec<_> = items.iter().map(|i| i.item_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn test_scores_rounded_to_four_places() {
        let items = sorted(
            ResultAggregator::new(2)
                .aggregate(vec![
                    RawScoredItem::new("a", 0.123456),
                    RawScoredItem::new("b", 0.98766),
                ])
                .await,
        );

        assert_eq!(items[0].score, 0.1235_f32);
        assert_eq!(items[1].score, 0.9877_f32);
    }

    #[tokio::test]
    async fn test_non_finite_score_becomes_zero() {
        let items = ResultAggregator::new(2)
            .aggregate(vec![RawScoredItem::new("nan", f64::NAN)])
            .await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_panicking_item_keeps_count() {
        fn faulty(raw: &RawScoredItem) -> Result<ScoredItem, String> {
            if raw.item_id == "i3" {
                panic!("formatter fault");
            }
            format_item(raw)
        }

        let items = ResultAggregator::new(3)
            .with_formatter(faulty)
            .aggregate(raw(6))
            .await;

        assert_eq!(items.len(), 6);
        let faulted = items.iter().find(|i| i.item_id == "i3").unwrap();
        assert_eq!(faulted.score, 0.0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert!(ResultAggregator::new(1).aggregate(Vec::new()).await.is_empty());
    }
}
