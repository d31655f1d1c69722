use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::transport::{DataSource, OrderFilters, Page};

/// A mutation the backend has acknowledged. Cache invalidation is keyed off
/// these and nothing else; the cache is never touched optimistically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    AssignOne(Uuid),
    AssignBulk,
    CancelOne(Uuid),
    CancelBulk,
}

/// List pages keyed by filter fingerprint plus order details keyed by id.
/// Only backend-sourced data is stored; synthetic reads pass through uncached
/// so a recovered backend is consulted again immediately.
pub struct QueryCache {
    lists: DashMap<u64, Page<Order>>,
    details: DashMap<Uuid, Order>,
    metrics: Metrics,
}

impl QueryCache {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            lists: DashMap::new(),
            details: DashMap::new(),
            metrics,
        }
    }

    pub fn list(&self, filters: &OrderFilters) -> Option<Page<Order>> {
        self.lists
            .get(&filters.fingerprint())
            .map(|entry| entry.value().clone())
    }

    pub fn store_list(&self, filters: &OrderFilters, page: &Page<Order>) {
        if page.source != DataSource::Backend {
            return;
        }
        self.lists.insert(filters.fingerprint(), page.clone());
    }

    pub fn detail(&self, id: Uuid) -> Option<Order> {
        self.details.get(&id).map(|entry| entry.value().clone())
    }

    pub fn store_detail(&self, order: &Order, source: DataSource) {
        if source != DataSource::Backend {
            return;
        }
        self.details.insert(order.id, order.clone());
    }

    /// Invalidation rules: a single-order mutation drops every list page and
    /// that order's detail; a bulk mutation drops list pages only, because
    /// affected details are re-polled individually.
    pub fn apply(&self, mutation: Mutation) {
        match mutation {
            Mutation::AssignOne(id) | Mutation::CancelOne(id) => {
                self.drop_lists();
                if self.details.remove(&id).is_some() {
                    self.metrics
                        .cache_invalidations_total
                        .with_label_values(&["detail"])
                        .inc();
                }
                debug!(order_id = %id, ?mutation, "cache invalidated");
            }
            Mutation::AssignBulk | Mutation::CancelBulk => {
                self.drop_lists();
                debug!(?mutation, "list cache invalidated");
            }
        }
    }

    fn drop_lists(&self) {
        let dropped = self.lists.len();
        self.lists.clear();
        if dropped > 0 {
            self.metrics
                .cache_invalidations_total
                .with_label_values(&["list"])
                .inc_by(dropped as u64);
        }
    }

    #[cfg(test)]
    pub(crate) fn list_entries(&self) -> usize {
        self.lists.len()
    }

    #[cfg(test)]
    pub(crate) fn detail_entries(&self) -> usize {
        self.details.len()
    }
}
