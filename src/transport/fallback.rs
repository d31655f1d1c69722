use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::error::ConsoleError;
use crate::models::driver::NearbyDriver;
use crate::models::order::{GeoPoint, Order};
use crate::observability::metrics::Metrics;
use crate::transport::{
    AssignReceipt, CancelReceipt, OrderFilters, OrderTransport, Page, Sourced,
};

/// Serves reads from the backend and falls back to the synthetic catalog when
/// the backend fails transiently. Auth and validation failures propagate, and
/// writes never fall back.
pub struct FallbackTransport {
    primary: Arc<dyn OrderTransport>,
    standby: Arc<dyn OrderTransport>,
    metrics: Metrics,
}

impl FallbackTransport {
    pub fn new(
        primary: Arc<dyn OrderTransport>,
        standby: Arc<dyn OrderTransport>,
        metrics: Metrics,
    ) -> Self {
        Self {
            primary,
            standby,
            metrics,
        }
    }

    fn note_fallback(&self, operation: &'static str, err: &ConsoleError) {
        warn!(
            error = %err,
            operation,
            "backend read failed; serving synthetic data"
        );
        self.metrics
            .fallback_total
            .with_label_values(&[operation])
            .inc();
    }
}

#[async_trait]
impl OrderTransport for FallbackTransport {
    async fn list_orders(&self, filters: &OrderFilters) -> Result<Page<Order>, ConsoleError> {
        match self.primary.list_orders(filters).await {
            Ok(page) => Ok(page),
            Err(err) if err.is_transient() => {
                self.note_fallback("list", &err);
                self.standby.list_orders(filters).await
            }
            Err(err) => Err(err),
        }
    }

    async fn get_order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError> {
        match self.primary.get_order(id).await {
            Ok(order) => Ok(order),
            Err(err) if err.is_transient() => {
                self.note_fallback("detail", &err);
                self.standby.get_order(id).await
            }
            Err(err) => Err(err),
        }
    }

    async fn assign_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        self.primary.assign_order(order_id, driver_id, notes).await
    }

    async fn assign_bulk(
        &self,
        order_ids: &[Uuid],
        driver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        self.primary.assign_bulk(order_ids, driver_id, notes).await
    }

    async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        self.primary.cancel_order(order_id, reason).await
    }

    async fn cancel_bulk(
        &self,
        order_ids: &[Uuid],
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        self.primary.cancel_bulk(order_ids, reason).await
    }

    async fn nearby_drivers(
        &self,
        order_id: Uuid,
        pickup: GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Sourced<Vec<NearbyDriver>>, ConsoleError> {
        match self
            .primary
            .nearby_drivers(order_id, pickup, radius_m, limit)
            .await
        {
            Ok(drivers) => Ok(drivers),
            Err(err) if err.is_transient() => {
                self.note_fallback("nearby", &err);
                self.standby
                    .nearby_drivers(order_id, pickup, radius_m, limit)
                    .await
            }
            Err(err) => Err(err),
        }
    }
}
