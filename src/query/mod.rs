use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cache::QueryCache;
use crate::error::ConsoleError;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::transport::{OrderFilters, OrderTransport, Page, Sourced};

pub mod detail;
pub mod tabs;

use self::detail::DetailWatch;

/// Read side of the console: cached list pages, order detail, and adaptive
/// detail polling.
pub struct OrderQueryService {
    transport: Arc<dyn OrderTransport>,
    cache: Arc<QueryCache>,
    metrics: Metrics,
    poll_interval: Duration,
}

impl OrderQueryService {
    pub fn new(
        transport: Arc<dyn OrderTransport>,
        cache: Arc<QueryCache>,
        metrics: Metrics,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            cache,
            metrics,
            poll_interval,
        }
    }

    /// Read-through list: a cached page for these filters wins, otherwise the
    /// transport is consulted and backend pages are cached.
    pub async fn orders(&self, filters: &OrderFilters) -> Result<Page<Order>, ConsoleError> {
        if let Some(page) = self.cache.list(filters) {
            self.metrics
                .list_requests_total
                .with_label_values(&["cache"])
                .inc();
            return Ok(page);
        }
        self.refresh_orders(filters).await
    }

    /// Bypasses the cache. Backs the operator's explicit refresh.
    pub async fn refresh_orders(
        &self,
        filters: &OrderFilters,
    ) -> Result<Page<Order>, ConsoleError> {
        let page = self.transport.list_orders(filters).await?;
        self.metrics
            .list_requests_total
            .with_label_values(&[page.source.as_str()])
            .inc();
        self.cache.store_list(filters, &page);
        Ok(page)
    }

    /// Read-through detail. Cache hits are backend data by construction, since
    /// synthetic reads are never stored.
    pub async fn order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError> {
        if let Some(order) = self.cache.detail(id) {
            self.metrics
                .detail_fetches_total
                .with_label_values(&["cache"])
                .inc();
            return Ok(Sourced::backend(order));
        }
        self.fresh_order(id).await
    }

    pub async fn fresh_order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError> {
        match self.transport.get_order(id).await {
            Ok(order) => {
                self.metrics
                    .detail_fetches_total
                    .with_label_values(&[order.source.as_str()])
                    .inc();
                self.cache.store_detail(&order.value, order.source);
                Ok(order)
            }
            Err(err) => {
                self.metrics
                    .detail_fetches_total
                    .with_label_values(&["error"])
                    .inc();
                Err(err)
            }
        }
    }

    /// Starts a poll loop on one order. The loop fetches immediately, then on
    /// every interval while the status stays in the active set.
    pub fn watch_order(&self, id: Uuid) -> DetailWatch {
        detail::spawn_watch(
            self.transport.clone(),
            self.cache.clone(),
            self.metrics.clone(),
            id,
            self.poll_interval,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use uuid::Uuid;

    use super::OrderQueryService;
    use crate::cache::QueryCache;
    use crate::error::ConsoleError;
    use crate::models::order::OrderStatus;
    use crate::observability::metrics::Metrics;
    use crate::transport::synthetic::SyntheticTransport;
    use crate::transport::testing::{StubTransport, order};
    use crate::transport::{DataSource, OrderFilters};

    fn setup(stub: Arc<StubTransport>) -> (OrderQueryService, Arc<QueryCache>, Metrics) {
        let metrics = Metrics::new();
        let cache = Arc::new(QueryCache::new(metrics.clone()));
        let service = OrderQueryService::new(
            stub,
            cache.clone(),
            metrics.clone(),
            Duration::from_millis(20),
        );
        (service, cache, metrics)
    }

    #[tokio::test]
    async fn list_reads_through_the_cache() {
        let stub = Arc::new(StubTransport::with_orders([
            order(1, OrderStatus::Searching),
            order(2, OrderStatus::Completed),
        ]));
        let (service, _cache, metrics) = setup(stub.clone());
        let filters = OrderFilters::default();

        let first = service.orders(&filters).await.expect("first page");
        assert_eq!(first.items.len(), 2);
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 1);

        let second = service.orders(&filters).await.expect("cached page");
        assert_eq!(second.items.len(), 2);
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            metrics.list_requests_total.with_label_values(&["cache"]).get(),
            1
        );

        service.refresh_orders(&filters).await.expect("refresh");
        assert_eq!(stub.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn synthetic_pages_are_served_but_not_cached() {
        let metrics = Metrics::new();
        let cache = Arc::new(QueryCache::new(metrics.clone()));
        let service = OrderQueryService::new(
            Arc::new(SyntheticTransport::new()),
            cache.clone(),
            metrics,
            Duration::from_millis(20),
        );

        let page = service
            .orders(&OrderFilters::default())
            .await
            .expect("synthetic page");

        assert_eq!(page.source, DataSource::Synthetic);
        assert_eq!(cache.list_entries(), 0);
    }

    #[tokio::test]
    async fn detail_reads_through_and_fresh_bypasses() {
        let stub = Arc::new(StubTransport::with_orders([order(
            1,
            OrderStatus::Searching,
        )]));
        let (service, _cache, _metrics) = setup(stub.clone());
        let id = Uuid::from_u128(1);

        let fetched = service.order(id).await.expect("detail");
        assert_eq!(fetched.value.id, id);
        assert_eq!(stub.get_calls.load(Ordering::SeqCst), 1);

        let cached = service.order(id).await.expect("cached detail");
        assert_eq!(cached.source, DataSource::Backend);
        assert_eq!(stub.get_calls.load(Ordering::SeqCst), 1);

        service.fresh_order(id).await.expect("forced fetch");
        assert_eq!(stub.get_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detail_errors_surface_and_count() {
        let stub = Arc::new(StubTransport::default());
        stub.get_failures.store(1, Ordering::SeqCst);
        let (service, _cache, metrics) = setup(stub);

        let err = service
            .fresh_order(Uuid::from_u128(7))
            .await
            .expect_err("transport error");

        assert!(matches!(err, ConsoleError::Network(_)));
        assert_eq!(
            metrics
                .detail_fetches_total
                .with_label_values(&["error"])
                .get(),
            1
        );
    }
}
