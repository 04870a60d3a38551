use crate::model::{ExtractionResult, MetricSet};
use std::fmt;

pub type SubscriptionId = u64;

/// Change notification sent to subscribers.
#[derive(Debug, Clone, Copy)]
pub enum StoreEvent<'a> {
    /// A result was appended at `index`.
    Recorded {
        index: usize,
        result: &'a ExtractionResult,
    },
    /// All results were removed.
    Cleared,
}

type Callback = Box<dyn Fn(&StoreEvent<'_>) + Send + Sync>;

/// Caller-owned history of extraction results with change callbacks.
#[derive(Default)]
pub struct MetricStore {
    results: Vec<ExtractionResult>,
    subscribers: Vec<(SubscriptionId, Callback)>,
    next_id: SubscriptionId,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; keep the id to unsubscribe later.
    pub fn subscribe(
        &mut self,
        callback: impl Fn(&StoreEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Append a copy of `result` and notify subscribers.
    pub fn record(&mut self, result: &ExtractionResult) {
        self.results.push(result.clone());
        let index = self.results.len() - 1;
        tracing::debug!(index, subscribers = self.subscribers.len(), "Result recorded");
        self.notify(&StoreEvent::Recorded {
            index,
            result: &self.results[index],
        });
    }

    pub fn clear(&mut self) {
        self.results.clear();
        self.notify(&StoreEvent::Cleared);
    }

    fn notify(&self, event: &StoreEvent<'_>) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }

    pub fn results(&self) -> &[ExtractionResult] {
        &self.results
    }

    pub fn latest(&self) -> Option<&ExtractionResult> {
        self.results.last()
    }

    /// Latest successful result.
    pub fn latest_success(&self) -> Option<&ExtractionResult> {
        self.results.iter().rev().find(|r| r.success)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Known metrics across successful results; later results win.
    pub fn merged_metrics(&self) -> MetricSet {
        let mut merged = MetricSet::new();
        for result in self.results.iter().filter(|r| r.success) {
            for (field, metric) in result.metrics.known() {
                merged.insert(field, metric.clone());
            }
        }
        merged
    }
}

impl fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricStore")
            .field("results", &self.results.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Metric};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn success(field: Field, value: f64) -> ExtractionResult {
        let mut result = ExtractionResult::failure("unused", vec![], Field::ALL);
        result.success = true;
        result.error = None;
        result
            .metrics
            .insert(field, Metric::extracted(value, 0.0, 95, vec![]));
        result
    }

    #[test]
    fn subscribers_see_records() {
        let mut store = MetricStore::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = store.subscribe(move |event| {
            if let StoreEvent::Recorded { index, .. } = event {
                counter.store(index + 1, Ordering::SeqCst);
            }
        });

        store.record(&success(Field::Downloads, 1.0));
        store.record(&success(Field::Downloads, 2.0));
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.record(&success(Field::Downloads, 3.0));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn clear_notifies() {
        let mut store = MetricStore::new();
        let cleared = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cleared);
        store.subscribe(move |event| {
            if matches!(event, StoreEvent::Cleared) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        store.record(&success(Field::Sessions, 5.0));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn merged_metrics_prefer_later_results() {
        let mut store = MetricStore::new();
        store.record(&success(Field::Downloads, 1.0));
        store.record(&success(Field::Sessions, 9.0));
        store.record(&success(Field::Downloads, 4.0));
        store.record(&ExtractionResult::failure("x", vec![], Field::ALL));

        let merged = store.merged_metrics();
        assert_eq!(merged.value(Field::Downloads), Some(4.0));
        assert_eq!(merged.value(Field::Sessions), Some(9.0));
        assert!(!store.latest().unwrap().success);
        assert!(store.latest_success().unwrap().success);
    }
}
