use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{Mutation, QueryCache};
use crate::config::Config;
use crate::error::ConsoleError;
use crate::external::{Action, NoticeKind, Notifier, PermissionGate};
use crate::models::driver::NearbyDriver;
use crate::models::order::GeoPoint;
use crate::observability::metrics::Metrics;
use crate::transport::{AssignReceipt, DataSource, OrderTransport};

#[derive(Debug, Clone, Copy)]
pub struct NearbySettings {
    pub radius_m: f64,
    pub limit: usize,
    pub ttl: Duration,
}

impl NearbySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            radius_m: config.nearby_radius_m,
            limit: config.nearby_limit,
            ttl: config.nearby_ttl(),
        }
    }
}

struct CandidateLookup {
    order_id: Uuid,
    drivers: Vec<NearbyDriver>,
    source: DataSource,
    fetched_at: Instant,
}

/// Drives one assignment at a time: candidate lookup, driver pick, commit.
/// The in-flight flag is the only serialization point; whichever commit takes
/// it first goes out, every concurrent attempt gets `CommitInFlight`.
pub struct AssignmentCoordinator {
    transport: Arc<dyn OrderTransport>,
    cache: Arc<QueryCache>,
    gate: Arc<dyn PermissionGate>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
    settings: NearbySettings,
    candidates: Mutex<Option<CandidateLookup>>,
    selected: Mutex<Option<NearbyDriver>>,
    commit_in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AssignmentCoordinator {
    pub fn new(
        transport: Arc<dyn OrderTransport>,
        cache: Arc<QueryCache>,
        gate: Arc<dyn PermissionGate>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
        settings: NearbySettings,
    ) -> Self {
        Self {
            transport,
            cache,
            gate,
            notifier,
            metrics,
            settings,
            candidates: Mutex::new(None),
            selected: Mutex::new(None),
            commit_in_flight: AtomicBool::new(false),
        }
    }

    fn lock_candidates(&self) -> MutexGuard<'_, Option<CandidateLookup>> {
        self.candidates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_selected(&self) -> MutexGuard<'_, Option<NearbyDriver>> {
        self.selected.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetches candidate drivers around an order's pickup point. A lookup for
    /// the same order within the TTL is answered from the last result. Orders
    /// without a pickup location are rejected before any network traffic.
    pub async fn lookup_nearby(
        &self,
        order_id: Uuid,
        pickup: Option<GeoPoint>,
    ) -> Result<Vec<NearbyDriver>, ConsoleError> {
        let Some(pickup) = pickup else {
            return Err(ConsoleError::Validation(
                "order has no pickup location".to_string(),
            ));
        };

        if let Some(lookup) = self.lock_candidates().as_ref() {
            if lookup.order_id == order_id && lookup.fetched_at.elapsed() < self.settings.ttl {
                self.metrics
                    .nearby_lookups_total
                    .with_label_values(&["cached"])
                    .inc();
                return Ok(lookup.drivers.clone());
            }
        }

        let fetched = self
            .transport
            .nearby_drivers(order_id, pickup, self.settings.radius_m, self.settings.limit)
            .await?;
        self.metrics
            .nearby_lookups_total
            .with_label_values(&[fetched.source.as_str()])
            .inc();

        let drivers = fetched.value.clone();
        *self.lock_candidates() = Some(CandidateLookup {
            order_id,
            drivers: fetched.value,
            source: fetched.source,
            fetched_at: Instant::now(),
        });

        Ok(drivers)
    }

    /// Source of the candidate list currently on hand, if any. Synthetic
    /// candidates are shown, but marked.
    pub fn candidate_source(&self) -> Option<DataSource> {
        self.lock_candidates().as_ref().map(|lookup| lookup.source)
    }

    pub fn select_driver(&self, driver: NearbyDriver) {
        *self.lock_selected() = Some(driver);
    }

    pub fn selected_driver(&self) -> Option<NearbyDriver> {
        self.lock_selected().clone()
    }

    pub fn clear_selection(&self) {
        *self.lock_selected() = None;
    }

    pub fn commit_in_flight(&self) -> bool {
        self.commit_in_flight.load(Ordering::SeqCst)
    }

    /// Sends the assignment for the given orders to the backend. At most one
    /// commit may be in flight; a failed commit keeps the driver selection so
    /// the operator can retry without re-picking.
    pub async fn commit(
        &self,
        order_ids: &[Uuid],
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        if order_ids.is_empty() {
            return Err(ConsoleError::Validation(
                "no orders selected for assignment".to_string(),
            ));
        }
        if !self.gate.allows(Action::AssignOrders) {
            return Err(ConsoleError::PermissionDenied(
                Action::AssignOrders.as_str(),
            ));
        }
        let Some(driver) = self.selected_driver() else {
            return Err(ConsoleError::NoDriverSelected);
        };

        let mode = if order_ids.len() == 1 { "single" } else { "bulk" };

        if self.commit_in_flight.swap(true, Ordering::SeqCst) {
            self.metrics
                .commits_total
                .with_label_values(&[mode, "blocked"])
                .inc();
            return Err(ConsoleError::CommitInFlight);
        }
        let _guard = InFlightGuard(&self.commit_in_flight);

        let start = Instant::now();
        let result = if let [order_id] = order_ids {
            self.transport
                .assign_order(*order_id, driver.id, notes)
                .await
        } else {
            self.transport
                .assign_bulk(order_ids, driver.id, notes)
                .await
        };
        self.metrics
            .request_latency_seconds
            .with_label_values(&["assign"])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(receipt) => {
                self.metrics
                    .commits_total
                    .with_label_values(&[mode, "success"])
                    .inc();

                // Invalidation happens strictly after the ack.
                let mutation = if let [order_id] = order_ids {
                    Mutation::AssignOne(*order_id)
                } else {
                    Mutation::AssignBulk
                };
                self.cache.apply(mutation);

                self.clear_selection();
                info!(
                    driver_id = %driver.id,
                    orders = order_ids.len(),
                    "assignment committed"
                );
                self.notifier.notify(
                    NoticeKind::Success,
                    &format!(
                        "assigned {} order(s) to {}",
                        receipt.order_ids.len(),
                        driver.name
                    ),
                );
                Ok(receipt)
            }
            Err(err) => {
                self.metrics
                    .commits_total
                    .with_label_values(&[mode, "error"])
                    .inc();
                warn!(
                    driver_id = %driver.id,
                    orders = order_ids.len(),
                    error = %err,
                    "assignment failed; selection kept"
                );
                self.notifier
                    .notify(NoticeKind::Error, &format!("assignment failed: {err}"));
                Err(err)
            }
        }
    }
}
