use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{Mutation, QueryCache};
use crate::config::{Config, TransportMode};
use crate::engine::assignment::{AssignmentCoordinator, NearbySettings};
use crate::engine::selection::SelectionSet;
use crate::error::ConsoleError;
use crate::external::{Action, NoticeKind, Notifier, PermissionGate};
use crate::observability::metrics::Metrics;
use crate::query::OrderQueryService;
use crate::transport::fallback::FallbackTransport;
use crate::transport::http::HttpTransport;
use crate::transport::synthetic::SyntheticTransport;
use crate::transport::{AssignReceipt, CancelReceipt, OrderTransport};

/// One operator session. The transport strategy is fixed at construction from
/// the configured mode; everything downstream is wired against the trait.
pub struct ConsoleSession {
    queries: OrderQueryService,
    assignments: AssignmentCoordinator,
    cache: Arc<QueryCache>,
    transport: Arc<dyn OrderTransport>,
    gate: Arc<dyn PermissionGate>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
}

impl ConsoleSession {
    pub fn new(
        config: &Config,
        gate: Arc<dyn PermissionGate>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConsoleError> {
        let metrics = Metrics::new();
        let transport: Arc<dyn OrderTransport> = match config.mode {
            TransportMode::Live => {
                info!(base_url = %config.api_base_url, "starting live session");
                Arc::new(FallbackTransport::new(
                    Arc::new(HttpTransport::new(config)?),
                    Arc::new(SyntheticTransport::new()),
                    metrics.clone(),
                ))
            }
            TransportMode::Offline => {
                info!("starting offline session with synthetic data");
                Arc::new(SyntheticTransport::new())
            }
        };

        Ok(Self::assemble(transport, config, gate, notifier, metrics))
    }

    /// Wires a session over any transport. The seam embedders and tests use
    /// to swap the backend out.
    pub fn with_transport(
        transport: Arc<dyn OrderTransport>,
        config: &Config,
        gate: Arc<dyn PermissionGate>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::assemble(transport, config, gate, notifier, Metrics::new())
    }

    fn assemble(
        transport: Arc<dyn OrderTransport>,
        config: &Config,
        gate: Arc<dyn PermissionGate>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(metrics.clone()));
        let queries = OrderQueryService::new(
            transport.clone(),
            cache.clone(),
            metrics.clone(),
            config.poll_interval(),
        );
        let assignments = AssignmentCoordinator::new(
            transport.clone(),
            cache.clone(),
            gate.clone(),
            notifier.clone(),
            metrics.clone(),
            NearbySettings::from_config(config),
        );

        Self {
            queries,
            assignments,
            cache,
            transport,
            gate,
            notifier,
            metrics,
        }
    }

    pub fn queries(&self) -> &OrderQueryService {
        &self.queries
    }

    pub fn assignments(&self) -> &AssignmentCoordinator {
        &self.assignments
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Commits the picked driver against the selected orders. The selection
    /// set is cleared only once the backend has acknowledged.
    pub async fn assign_selected(
        &self,
        selection: &mut SelectionSet,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        let ids = selection.ids();
        let receipt = self.assignments.commit(&ids, notes).await?;
        selection.deselect_all();
        Ok(receipt)
    }

    pub async fn cancel_order(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        self.check_cancel(reason)?;

        match self.transport.cancel_order(id, reason).await {
            Ok(receipt) => {
                self.metrics
                    .cancels_total
                    .with_label_values(&["single", "success"])
                    .inc();
                self.cache.apply(Mutation::CancelOne(id));
                info!(order_id = %id, reason, "order cancelled");
                self.notifier
                    .notify(NoticeKind::Success, "order cancelled");
                Ok(receipt)
            }
            Err(err) => {
                self.metrics
                    .cancels_total
                    .with_label_values(&["single", "error"])
                    .inc();
                warn!(order_id = %id, error = %err, "cancellation failed");
                self.notifier
                    .notify(NoticeKind::Error, &format!("cancellation failed: {err}"));
                Err(err)
            }
        }
    }

    /// Bulk cancel over the selection set. All-or-nothing on the backend; the
    /// selection survives a failure so the operator can retry.
    pub async fn cancel_selected(
        &self,
        selection: &mut SelectionSet,
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        if selection.is_empty() {
            return Err(ConsoleError::Validation(
                "no orders selected for cancellation".to_string(),
            ));
        }
        self.check_cancel(reason)?;

        let ids = selection.ids();
        match self.transport.cancel_bulk(&ids, reason).await {
            Ok(receipt) => {
                self.metrics
                    .cancels_total
                    .with_label_values(&["bulk", "success"])
                    .inc();
                self.cache.apply(Mutation::CancelBulk);
                selection.deselect_all();
                info!(orders = ids.len(), reason, "orders cancelled");
                self.notifier.notify(
                    NoticeKind::Success,
                    &format!("cancelled {} order(s)", receipt.order_ids.len()),
                );
                Ok(receipt)
            }
            Err(err) => {
                self.metrics
                    .cancels_total
                    .with_label_values(&["bulk", "error"])
                    .inc();
                warn!(orders = ids.len(), error = %err, "bulk cancellation failed");
                self.notifier
                    .notify(NoticeKind::Error, &format!("cancellation failed: {err}"));
                Err(err)
            }
        }
    }

    fn check_cancel(&self, reason: &str) -> Result<(), ConsoleError> {
        if !self.gate.allows(Action::CancelOrders) {
            return Err(ConsoleError::PermissionDenied(
                Action::CancelOrders.as_str(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(ConsoleError::Validation(
                "cancellation requires a reason".to_string(),
            ));
        }
        Ok(())
    }
}
