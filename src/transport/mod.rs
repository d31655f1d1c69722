use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ConsoleError;
use crate::models::driver::NearbyDriver;
use crate::models::order::{GeoPoint, Order, OrderStatus, Priority, ServiceKind};

pub mod fallback;
pub mod http;
pub mod synthetic;

/// Where a piece of data came from. Synthetic data is served when the backend
/// is unreachable and must stay distinguishable all the way to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Backend,
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Backend => "backend",
            DataSource::Synthetic => "synthetic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sourced<T> {
    pub value: T,
    pub source: DataSource,
}

impl<T> Sourced<T> {
    pub fn backend(value: T) -> Self {
        Self {
            value,
            source: DataSource::Backend,
        }
    }

    pub fn synthetic(value: T) -> Self {
        Self {
            value,
            source: DataSource::Synthetic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub source: DataSource,
}

impl<T> Page<T> {
    pub fn empty(page: u32, page_size: u32, source: DataSource) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            page_size,
            total_pages: 0,
            source,
        }
    }
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64) as u32
}

/// List query sent to the backend. Also the cache key for list pages, so the
/// fingerprint must cover every field that changes the result set.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFilters {
    pub statuses: Vec<OrderStatus>,
    pub services: Vec<ServiceKind>,
    pub priorities: Vec<Priority>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for OrderFilters {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            services: Vec::new(),
            priorities: Vec::new(),
            from: None,
            to: None,
            search: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl OrderFilters {
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.statuses.hash(&mut hasher);
        self.services.hash(&mut hasher);
        self.priorities.hash(&mut hasher);
        self.from.hash(&mut hasher);
        self.to.hash(&mut hasher);
        self.search.hash(&mut hasher);
        self.page.hash(&mut hasher);
        self.page_size.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone)]
pub struct AssignReceipt {
    pub order_ids: Vec<Uuid>,
    pub driver_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CancelReceipt {
    pub order_ids: Vec<Uuid>,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderTransport: Send + Sync {
    async fn list_orders(&self, filters: &OrderFilters) -> Result<Page<Order>, ConsoleError>;

    async fn get_order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError>;

    async fn assign_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError>;

    async fn assign_bulk(
        &self,
        order_ids: &[Uuid],
        driver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError>;

    async fn cancel_order(&self, order_id: Uuid, reason: &str) -> Result<CancelReceipt, ConsoleError>;

    async fn cancel_bulk(
        &self,
        order_ids: &[Uuid],
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError>;

    async fn nearby_drivers(
        &self,
        order_id: Uuid,
        pickup: GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Sourced<Vec<NearbyDriver>>, ConsoleError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use dashmap::DashMap;
    use tokio::time::{Duration, sleep};
    use uuid::Uuid;

    use super::{
        AssignReceipt, CancelReceipt, OrderFilters, OrderTransport, Page, Sourced, total_pages,
    };
    use crate::error::ConsoleError;
    use crate::models::driver::{DriverStatus, NearbyDriver, VehicleType};
    use crate::models::order::{
        Customer, DriverAssignment, GeoPoint, Order, OrderFlags, OrderStatus, Pricing, Priority,
        Route, ServiceKind, Timeline,
    };

    pub(crate) fn created_at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_715_000_000, 0).expect("valid timestamp")
    }

    pub(crate) fn order(id: u128, status: OrderStatus) -> Order {
        let mut timeline = Timeline::starting_at(created_at());
        if status != OrderStatus::Pending {
            timeline.stamp(status, created_at());
        }

        Order {
            id: Uuid::from_u128(id),
            status,
            reported_status: status.label().to_string(),
            priority: Priority::Normal,
            service: ServiceKind::Ride,
            customer: Customer {
                id: Uuid::from_u128(id + 1000),
                name: format!("customer-{id}"),
                phone: String::new(),
            },
            assignment: DriverAssignment::Unassigned,
            route: Route {
                pickup: GeoPoint {
                    lat: 52.52,
                    lng: 13.405,
                },
                dropoff: GeoPoint {
                    lat: 52.54,
                    lng: 13.42,
                },
                pickup_address: String::new(),
                dropoff_address: String::new(),
                estimated_distance_m: 2500.0,
                estimated_duration_secs: 600,
                actual_distance_m: None,
                actual_duration_secs: None,
            },
            pricing: Pricing {
                base_fare: 2.0,
                distance_fare: 5.0,
                time_fare: 1.5,
                surge_multiplier: 1.0,
                total: 8.5,
                payment_method: Default::default(),
                paid: false,
            },
            timeline,
            flags: OrderFlags::default(),
        }
    }

    pub(crate) fn candidate(id: u128, distance_m: f64) -> NearbyDriver {
        NearbyDriver {
            id: Uuid::from_u128(id),
            name: format!("driver-{id}"),
            status: DriverStatus::Online,
            distance_m,
            eta_secs: (distance_m / 8.0) as u32,
            rating: 4.8,
            vehicle: VehicleType::Sedan,
            trust_score: 92.0,
        }
    }

    /// In-memory transport for unit tests. Failure counters burn down one
    /// call at a time; the status script overrides consecutive `get_order`
    /// results to drive poll-loop tests.
    #[derive(Default)]
    pub(crate) struct StubTransport {
        pub orders: DashMap<Uuid, Order>,
        pub candidates: Mutex<Vec<NearbyDriver>>,
        pub status_script: Mutex<VecDeque<OrderStatus>>,
        pub list_failures: AtomicU32,
        pub get_failures: AtomicU32,
        pub assign_failures: AtomicU32,
        pub cancel_failures: AtomicU32,
        pub list_calls: AtomicU32,
        pub get_calls: AtomicU32,
        pub assign_calls: AtomicU32,
        pub cancel_calls: AtomicU32,
        pub nearby_calls: AtomicU32,
        pub assign_delay_ms: AtomicU64,
    }

    impl StubTransport {
        pub(crate) fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
            let stub = Self::default();
            for order in orders {
                stub.orders.insert(order.id, order);
            }
            stub
        }

        pub(crate) fn script_statuses(&self, statuses: impl IntoIterator<Item = OrderStatus>) {
            self.status_script
                .lock()
                .expect("status script lock")
                .extend(statuses);
        }

        fn take_failure(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl OrderTransport for StubTransport {
        async fn list_orders(&self, filters: &OrderFilters) -> Result<Page<Order>, ConsoleError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.list_failures) {
                return Err(ConsoleError::Network("stub list offline".to_string()));
            }

            let mut items: Vec<Order> = self.orders.iter().map(|e| e.value().clone()).collect();
            items.sort_by_key(|o| o.id);
            let total = items.len() as u64;

            Ok(Page {
                items,
                total,
                page: filters.page,
                page_size: filters.page_size,
                total_pages: total_pages(total, filters.page_size),
                source: super::DataSource::Backend,
            })
        }

        async fn get_order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.get_failures) {
                return Err(ConsoleError::Network("stub get offline".to_string()));
            }

            if let Some(next) = self
                .status_script
                .lock()
                .expect("status script lock")
                .pop_front()
            {
                if let Some(mut entry) = self.orders.get_mut(&id) {
                    entry.status = next;
                    entry.timeline.stamp(next, Utc::now());
                }
            }

            self.orders
                .get(&id)
                .map(|entry| Sourced::backend(entry.value().clone()))
                .ok_or_else(|| ConsoleError::NotFound(id.to_string()))
        }

        async fn assign_order(
            &self,
            order_id: Uuid,
            driver_id: Uuid,
            notes: Option<&str>,
        ) -> Result<AssignReceipt, ConsoleError> {
            self.assign_bulk(&[order_id], driver_id, notes).await
        }

        async fn assign_bulk(
            &self,
            order_ids: &[Uuid],
            driver_id: Uuid,
            _notes: Option<&str>,
        ) -> Result<AssignReceipt, ConsoleError> {
            self.assign_calls.fetch_add(1, Ordering::SeqCst);

            let delay = self.assign_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                sleep(Duration::from_millis(delay)).await;
            }

            if Self::take_failure(&self.assign_failures) {
                return Err(ConsoleError::Upstream {
                    status: 500,
                    message: "stub assign failed".to_string(),
                });
            }

            for id in order_ids {
                if let Some(mut entry) = self.orders.get_mut(id) {
                    entry.status = OrderStatus::Assigned;
                    entry.timeline.stamp(OrderStatus::Assigned, Utc::now());
                }
            }

            Ok(AssignReceipt {
                order_ids: order_ids.to_vec(),
                driver_id,
                assigned_at: Utc::now(),
            })
        }

        async fn cancel_order(
            &self,
            order_id: Uuid,
            reason: &str,
        ) -> Result<CancelReceipt, ConsoleError> {
            self.cancel_bulk(&[order_id], reason).await
        }

        async fn cancel_bulk(
            &self,
            order_ids: &[Uuid],
            reason: &str,
        ) -> Result<CancelReceipt, ConsoleError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if Self::take_failure(&self.cancel_failures) {
                return Err(ConsoleError::Upstream {
                    status: 500,
                    message: "stub cancel failed".to_string(),
                });
            }

            for id in order_ids {
                if let Some(mut entry) = self.orders.get_mut(id) {
                    entry.status = OrderStatus::Cancelled;
                    entry.timeline.stamp(OrderStatus::Cancelled, Utc::now());
                }
            }

            Ok(CancelReceipt {
                order_ids: order_ids.to_vec(),
                reason: reason.to_string(),
                cancelled_at: Utc::now(),
            })
        }

        async fn nearby_drivers(
            &self,
            _order_id: Uuid,
            _pickup: GeoPoint,
            _radius_m: f64,
            limit: usize,
        ) -> Result<Sourced<Vec<NearbyDriver>>, ConsoleError> {
            self.nearby_calls.fetch_add(1, Ordering::SeqCst);
            let candidates = self.candidates.lock().expect("candidates lock");
            Ok(Sourced::backend(
                candidates.iter().take(limit).cloned().collect(),
            ))
        }
    }

    #[test]
    fn filter_fingerprint_tracks_every_field() {
        let base = OrderFilters::default();
        assert_eq!(base.fingerprint(), OrderFilters::default().fingerprint());

        let paged = OrderFilters::default().with_page(2);
        assert_ne!(base.fingerprint(), paged.fingerprint());

        let searched = OrderFilters {
            search: Some("alex".to_string()),
            ..OrderFilters::default()
        };
        assert_ne!(base.fingerprint(), searched.fingerprint());

        let filtered = OrderFilters {
            statuses: vec![OrderStatus::Searching],
            ..OrderFilters::default()
        };
        assert_ne!(base.fingerprint(), filtered.fingerprint());
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(50, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
        assert_eq!(total_pages(1, 0), 0);
    }
}
