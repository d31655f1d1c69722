//! Offline order catalog. Every record is derived from a fixed seed, so the
//! same page or order id always yields the same data; assign and cancel write
//! into an overlay on top of the generated catalog.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::error::ConsoleError;
use crate::geo::haversine_m;
use crate::models::driver::{DriverStatus, NearbyDriver, VehicleType};
use crate::models::order::{
    AssignedDriver, Customer, DriverAssignment, GeoPoint, Order, OrderFlags, OrderStatus,
    PaymentMethod, Pricing, Priority, Route, ServiceKind, Timeline,
};
use crate::transport::{
    AssignReceipt, CancelReceipt, DataSource, OrderFilters, OrderTransport, Page, Sourced,
    total_pages,
};

pub const SYNTHETIC_TOTAL: u64 = 50;

// High halves of every generated uuid, so catalog ids are recognizable and the
// low half can carry the generation seed.
const ORDER_TAG_HI: u64 = 0xFACE_FEED_0000_0000;
const DRIVER_TAG_HI: u64 = 0xD81F_E11A_0000_0000;

const ORDER_SEED: u64 = 0x0DD5_EED5;
const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

const STATUS_CYCLE: [OrderStatus; 12] = [
    OrderStatus::Searching,
    OrderStatus::Assigned,
    OrderStatus::Completed,
    OrderStatus::Pending,
    OrderStatus::EnRoute,
    OrderStatus::Cancelled,
    OrderStatus::Accepted,
    OrderStatus::OnTrip,
    OrderStatus::Scheduled,
    OrderStatus::Arrived,
    OrderStatus::Delivered,
    OrderStatus::InTransit,
];

const CUSTOMER_NAMES: [&str; 10] = [
    "Ada Osei",
    "Bruno Keller",
    "Chiara Ricci",
    "Dmitri Volkov",
    "Elif Kaya",
    "Femi Adeyemi",
    "Greta Lindqvist",
    "Hana Sato",
    "Igor Petrov",
    "Jana Novak",
];

const DRIVER_NAMES: [&str; 10] = [
    "Karim Haddad",
    "Lena Fischer",
    "Mateo Silva",
    "Nadia Rahman",
    "Omar Farouk",
    "Priya Nair",
    "Quentin Dubois",
    "Rosa Mendez",
    "Stefan Weber",
    "Tomas Horak",
];

// Berlin city center; routes are scattered around it.
const CENTER: GeoPoint = GeoPoint {
    lat: 52.52,
    lng: 13.405,
};

pub struct SyntheticTransport {
    overlay: DashMap<Uuid, Order>,
}

impl SyntheticTransport {
    pub fn new() -> Self {
        Self {
            overlay: DashMap::new(),
        }
    }

    fn resolve(&self, id: Uuid) -> Option<Order> {
        if let Some(entry) = self.overlay.get(&id) {
            return Some(entry.value().clone());
        }
        catalog_index(id).map(catalog_order)
    }

    fn apply_assign(&self, order_ids: &[Uuid], driver_id: Uuid) -> Result<(), ConsoleError> {
        if order_ids.is_empty() {
            return Err(ConsoleError::Validation("no orders to assign".to_string()));
        }

        // Validate the whole batch before touching anything.
        let mut orders = Vec::with_capacity(order_ids.len());
        for id in order_ids {
            let order = self
                .resolve(*id)
                .ok_or_else(|| ConsoleError::NotFound(id.to_string()))?;
            if !order.status.is_assignable() {
                return Err(ConsoleError::Validation(format!(
                    "order {id} is {} and cannot be assigned",
                    order.status.label()
                )));
            }
            orders.push(order);
        }

        let driver = driver_from_id(driver_id);
        let now = Utc::now();
        for mut order in orders {
            order.status = OrderStatus::Assigned;
            order.reported_status = OrderStatus::Assigned.label().to_string();
            order.assignment = DriverAssignment::Assigned(driver.clone());
            order.timeline.stamp(OrderStatus::Assigned, now);
            self.overlay.insert(order.id, order);
        }

        Ok(())
    }

    fn apply_cancel(&self, order_ids: &[Uuid]) -> Result<(), ConsoleError> {
        if order_ids.is_empty() {
            return Err(ConsoleError::Validation("no orders to cancel".to_string()));
        }

        let mut orders = Vec::with_capacity(order_ids.len());
        for id in order_ids {
            let order = self
                .resolve(*id)
                .ok_or_else(|| ConsoleError::NotFound(id.to_string()))?;
            if order.status.is_terminal() {
                return Err(ConsoleError::Validation(format!(
                    "order {id} is already {}",
                    order.status.label()
                )));
            }
            orders.push(order);
        }

        let now = Utc::now();
        for mut order in orders {
            order.status = OrderStatus::Cancelled;
            order.reported_status = OrderStatus::Cancelled.label().to_string();
            order.timeline.stamp(OrderStatus::Cancelled, now);
            self.overlay.insert(order.id, order);
        }

        Ok(())
    }
}

impl Default for SyntheticTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderTransport for SyntheticTransport {
    async fn list_orders(&self, filters: &OrderFilters) -> Result<Page<Order>, ConsoleError> {
        if filters.page == 0 || filters.page_size == 0 {
            return Err(ConsoleError::Validation(
                "page and page_size must be positive".to_string(),
            ));
        }

        let start = (filters.page as u64 - 1).saturating_mul(filters.page_size as u64);
        let end = (start + filters.page_size as u64).min(SYNTHETIC_TOTAL);

        let items: Vec<Order> = (start..end)
            .map(|idx| {
                let generated = catalog_order(idx as usize);
                self.overlay
                    .get(&generated.id)
                    .map(|entry| entry.value().clone())
                    .unwrap_or(generated)
            })
            .collect();

        Ok(Page {
            items,
            total: SYNTHETIC_TOTAL,
            page: filters.page,
            page_size: filters.page_size,
            total_pages: total_pages(SYNTHETIC_TOTAL, filters.page_size),
            source: DataSource::Synthetic,
        })
    }

    async fn get_order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError> {
        self.resolve(id)
            .map(Sourced::synthetic)
            .ok_or_else(|| ConsoleError::NotFound(id.to_string()))
    }

    async fn assign_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        _notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        self.apply_assign(&[order_id], driver_id)?;
        Ok(AssignReceipt {
            order_ids: vec![order_id],
            driver_id,
            assigned_at: Utc::now(),
        })
    }

    async fn assign_bulk(
        &self,
        order_ids: &[Uuid],
        driver_id: Uuid,
        _notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        self.apply_assign(order_ids, driver_id)?;
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
        self.apply_cancel(&[order_id])?;
        Ok(CancelReceipt {
            order_ids: vec![order_id],
            reason: reason.to_string(),
            cancelled_at: Utc::now(),
        })
    }

    async fn cancel_bulk(
        &self,
        order_ids: &[Uuid],
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        self.apply_cancel(order_ids)?;
        Ok(CancelReceipt {
            order_ids: order_ids.to_vec(),
            reason: reason.to_string(),
            cancelled_at: Utc::now(),
        })
    }

    async fn nearby_drivers(
        &self,
        order_id: Uuid,
        _pickup: GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Sourced<Vec<NearbyDriver>>, ConsoleError> {
        let mut drivers: Vec<NearbyDriver> = (0..limit)
            .map(|slot| {
                let seed = (order_id.as_u128() as u64) ^ (slot as u64).wrapping_mul(GOLDEN);
                let mut rng = StdRng::seed_from_u64(seed);
                let identity = driver_identity(seed);

                NearbyDriver {
                    id: driver_id_from_seed(seed),
                    name: identity.name,
                    status: DriverStatus::Online,
                    distance_m: rng.gen_range(80.0..radius_m.max(100.0)),
                    eta_secs: 0,
                    rating: identity.rating,
                    vehicle: identity.vehicle,
                    trust_score: identity.trust_score,
                }
            })
            .collect();

        for driver in &mut drivers {
            driver.eta_secs = (driver.distance_m / 7.0) as u32;
        }
        drivers.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        Ok(Sourced::synthetic(drivers))
    }
}

fn catalog_id(idx: usize) -> Uuid {
    Uuid::from_u128(((ORDER_TAG_HI as u128) << 64) | idx as u128)
}

fn catalog_index(id: Uuid) -> Option<usize> {
    let value = id.as_u128();
    let hi = (value >> 64) as u64;
    let lo = value as u64;
    (hi == ORDER_TAG_HI && lo < SYNTHETIC_TOTAL).then_some(lo as usize)
}

fn driver_id_from_seed(seed: u64) -> Uuid {
    Uuid::from_u128(((DRIVER_TAG_HI as u128) << 64) | seed as u128)
}

struct DriverIdentity {
    name: String,
    vehicle: VehicleType,
    rating: f64,
    trust_score: f64,
}

// The identity lives entirely in the seed, so an assignment made from a
// previously listed candidate reproduces that candidate exactly.
fn driver_identity(seed: u64) -> DriverIdentity {
    let mut rng = StdRng::seed_from_u64(seed ^ GOLDEN);
    let name = DRIVER_NAMES[rng.gen_range(0..DRIVER_NAMES.len())].to_string();
    let vehicle = match rng.gen_range(0..5) {
        0 => VehicleType::Sedan,
        1 => VehicleType::Suv,
        2 => VehicleType::Van,
        3 => VehicleType::Motorbike,
        _ => VehicleType::Bicycle,
    };
    let rating = (rng.gen_range(3.5..=5.0_f64) * 10.0).round() / 10.0;
    let trust_score = rng.gen_range(60.0_f64..=100.0).round();

    DriverIdentity {
        name,
        vehicle,
        rating,
        trust_score,
    }
}

fn driver_from_id(driver_id: Uuid) -> AssignedDriver {
    let seed = driver_id.as_u128() as u64;
    let identity = driver_identity(seed);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x7E1E);

    AssignedDriver {
        id: driver_id,
        name: identity.name,
        phone: format!("+4930{:07}", rng.gen_range(1_000_000..10_000_000)),
        vehicle: identity.vehicle,
        rating: identity.rating,
    }
}

fn anchor() -> DateTime<Utc> {
    DateTime::from_timestamp(1_714_000_000, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn jitter(rng: &mut StdRng, point: GeoPoint, spread: f64) -> GeoPoint {
    GeoPoint {
        lat: point.lat + rng.gen_range(-spread..spread),
        lng: point.lng + rng.gen_range(-spread..spread),
    }
}

fn catalog_order(idx: usize) -> Order {
    let mut rng = StdRng::seed_from_u64(ORDER_SEED ^ (idx as u64).wrapping_mul(GOLDEN));
    let id = catalog_id(idx);
    let status = STATUS_CYCLE[idx % STATUS_CYCLE.len()];

    let service = if idx % 3 == 0 {
        ServiceKind::Delivery
    } else {
        ServiceKind::Ride
    };
    let priority = if idx % 7 == 0 {
        Priority::Urgent
    } else if idx % 5 == 0 {
        Priority::High
    } else {
        Priority::Normal
    };

    let pickup = jitter(&mut rng, CENTER, 0.05);
    let dropoff = jitter(&mut rng, CENTER, 0.05);
    let estimated_distance_m = haversine_m(&pickup, &dropoff).max(300.0);
    let estimated_duration_secs = (estimated_distance_m / 8.3) as u32;

    let base_fare = 2.5;
    let distance_fare = estimated_distance_m / 1000.0 * 1.2;
    let time_fare = estimated_duration_secs as f64 / 60.0 * 0.35;
    let surge_multiplier = if rng.gen_bool(0.2) { 1.3 } else { 1.0 };
    let total = ((base_fare + distance_fare + time_fare) * surge_multiplier * 100.0).round() / 100.0;

    let created_at = anchor() + Duration::seconds(idx as i64 * 137);
    let timeline = backfill_timeline(status, created_at);

    let assignment = if needs_driver(status) {
        let seed = (idx as u64).wrapping_mul(GOLDEN) ^ 0xCAB;
        DriverAssignment::Assigned(driver_from_id(driver_id_from_seed(seed)))
    } else {
        DriverAssignment::Unassigned
    };

    let completed = matches!(status, OrderStatus::Completed | OrderStatus::Delivered);

    Order {
        id,
        status,
        reported_status: status.label().to_string(),
        priority,
        service,
        customer: Customer {
            id: Uuid::from_u128(((idx as u128) << 8) | 0xC0),
            name: CUSTOMER_NAMES[idx % CUSTOMER_NAMES.len()].to_string(),
            phone: format!("+4917{:08}", rng.gen_range(10_000_000..100_000_000)),
        },
        assignment,
        route: Route {
            pickup,
            dropoff,
            pickup_address: format!("Invalidenstrasse {}", idx + 1),
            dropoff_address: format!("Karl-Marx-Allee {}", idx + 2),
            estimated_distance_m,
            estimated_duration_secs,
            actual_distance_m: completed.then_some(estimated_distance_m * 1.07),
            actual_duration_secs: completed.then_some(estimated_duration_secs + 90),
        },
        pricing: Pricing {
            base_fare,
            distance_fare,
            time_fare,
            surge_multiplier,
            total,
            payment_method: match idx % 3 {
                0 => PaymentMethod::Card,
                1 => PaymentMethod::Cash,
                _ => PaymentMethod::Wallet,
            },
            paid: completed,
        },
        timeline,
        flags: OrderFlags {
            prioritized: priority != Priority::Normal,
            scheduled: status == OrderStatus::Scheduled,
            special_requirements: rng.gen_bool(0.15),
            requires_verification: rng.gen_bool(0.1),
        },
    }
}

fn needs_driver(status: OrderStatus) -> bool {
    !status.is_assignable() && status != OrderStatus::Cancelled
}

// Stamps the canonical progression up to the current status so generated
// records look like they actually moved through the lifecycle.
fn backfill_timeline(status: OrderStatus, created_at: DateTime<Utc>) -> Timeline {
    let mut timeline = Timeline::starting_at(created_at);
    let mut minute = 0;
    let mut stamp_next = |timeline: &mut Timeline, stage: OrderStatus| {
        minute += 2;
        timeline.stamp(stage, created_at + Duration::minutes(minute));
    };

    let path: &[OrderStatus] = match status {
        OrderStatus::Pending => &[],
        OrderStatus::Scheduled => &[OrderStatus::Scheduled],
        OrderStatus::Searching => &[OrderStatus::Searching],
        OrderStatus::Assigned => &[OrderStatus::Searching, OrderStatus::Assigned],
        OrderStatus::Accepted => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
        ],
        OrderStatus::EnRoute => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
        ],
        OrderStatus::Arrived => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
        ],
        OrderStatus::OnTrip => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::OnTrip,
        ],
        OrderStatus::InTransit => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::InTransit,
        ],
        OrderStatus::Completed => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::OnTrip,
            OrderStatus::Completed,
        ],
        OrderStatus::Delivered => &[
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ],
        OrderStatus::Cancelled => &[OrderStatus::Searching, OrderStatus::Cancelled],
    };

    for stage in path {
        stamp_next(&mut timeline, *stage);
    }

    timeline
}
