//! Normalization of upstream order payloads. Upstream feeds disagree on field
//! names and omit sub-objects freely; everything here is total, so a structurally
//! valid payload always yields an `Order`, with documented neutral defaults and
//! a warning for anything that had to be repaired.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::models::driver::{DriverStatus, NearbyDriver, VehicleType};
use crate::models::order::{
    AssignedDriver, Customer, DriverAssignment, GeoPoint, Order, OrderFlags, OrderStatus,
    PaymentMethod, Pricing, Priority, Route, ServiceKind, Timeline,
};

/// Missing driver ratings default to a full score rather than penalizing the
/// record.
pub const DEFAULT_RATING: f64 = 5.0;
pub const DEFAULT_TRUST_SCORE: f64 = 100.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawOrder {
    #[serde(alias = "orderId", alias = "order_id", alias = "_id")]
    pub id: Option<Uuid>,
    #[serde(alias = "orderStatus", alias = "state")]
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(alias = "serviceType", alias = "service_type")]
    pub service: Option<String>,
    pub customer: Option<RawCustomer>,
    #[serde(alias = "assignedDriver", alias = "courier")]
    pub driver: Option<RawAssignedDriver>,
    pub route: Option<RawRoute>,
    #[serde(alias = "fare")]
    pub pricing: Option<RawPricing>,
    pub timeline: Option<RawTimeline>,
    pub flags: Option<RawFlags>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCustomer {
    #[serde(alias = "customerId", alias = "customer_id")]
    pub id: Option<Uuid>,
    #[serde(alias = "fullName", alias = "full_name")]
    pub name: Option<String>,
    #[serde(alias = "phoneNumber", alias = "phone_number")]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAssignedDriver {
    #[serde(alias = "driverId", alias = "driver_id")]
    pub id: Option<Uuid>,
    #[serde(alias = "fullName", alias = "full_name")]
    pub name: Option<String>,
    #[serde(alias = "phoneNumber", alias = "phone_number")]
    pub phone: Option<String>,
    #[serde(alias = "vehicleType", alias = "vehicle_type")]
    pub vehicle: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPoint {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude", alias = "lon")]
    pub lng: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRoute {
    #[serde(alias = "pickupLocation", alias = "pickup_location")]
    pub pickup: Option<RawPoint>,
    #[serde(alias = "dropoffLocation", alias = "dropoff_location", alias = "destination")]
    pub dropoff: Option<RawPoint>,
    #[serde(alias = "pickupAddress")]
    pub pickup_address: Option<String>,
    #[serde(alias = "dropoffAddress")]
    pub dropoff_address: Option<String>,
    #[serde(alias = "estimatedDistance", alias = "estimated_distance")]
    pub estimated_distance_m: Option<f64>,
    #[serde(alias = "estimatedDuration", alias = "estimated_duration")]
    pub estimated_duration_secs: Option<u32>,
    #[serde(alias = "actualDistance", alias = "actual_distance")]
    pub actual_distance_m: Option<f64>,
    #[serde(alias = "actualDuration", alias = "actual_duration")]
    pub actual_duration_secs: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPricing {
    #[serde(alias = "baseFare", alias = "base")]
    pub base_fare: Option<f64>,
    #[serde(alias = "distanceFare")]
    pub distance_fare: Option<f64>,
    #[serde(alias = "timeFare")]
    pub time_fare: Option<f64>,
    #[serde(alias = "surgeMultiplier", alias = "surge")]
    pub surge_multiplier: Option<f64>,
    #[serde(alias = "totalFare", alias = "amount")]
    pub total: Option<f64>,
    #[serde(alias = "paymentMethod", alias = "payment_method")]
    pub payment: Option<String>,
    #[serde(alias = "isPaid", alias = "is_paid")]
    pub paid: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTimeline {
    #[serde(alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(alias = "scheduledAt")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(alias = "searchingAt")]
    pub searching_at: Option<DateTime<Utc>>,
    #[serde(alias = "assignedAt")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(alias = "acceptedAt")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(alias = "enRouteAt")]
    pub en_route_at: Option<DateTime<Utc>>,
    #[serde(alias = "arrivedAt")]
    pub arrived_at: Option<DateTime<Utc>>,
    #[serde(alias = "startedAt", alias = "pickedUpAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(alias = "completedAt", alias = "deliveredAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(alias = "cancelledAt", alias = "canceledAt")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawFlags {
    #[serde(alias = "isPrioritized", alias = "isPriority")]
    pub prioritized: Option<bool>,
    #[serde(alias = "isScheduled")]
    pub scheduled: Option<bool>,
    #[serde(alias = "hasSpecialRequirements", alias = "specialRequirements")]
    pub special_requirements: Option<bool>,
    #[serde(alias = "requiresVerification", alias = "needsVerification")]
    pub requires_verification: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawDriverCandidate {
    #[serde(alias = "driverId", alias = "driver_id")]
    pub id: Option<Uuid>,
    #[serde(alias = "fullName", alias = "full_name")]
    pub name: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "distance", alias = "distanceMeters")]
    pub distance_m: Option<f64>,
    #[serde(alias = "eta", alias = "estimatedArrival", alias = "estimated_arrival")]
    pub eta_secs: Option<u32>,
    pub rating: Option<f64>,
    #[serde(alias = "vehicleType", alias = "vehicle_type")]
    pub vehicle: Option<String>,
    #[serde(alias = "trustScore", alias = "trust_score")]
    pub trust_score: Option<f64>,
}

pub fn normalize_order(raw: RawOrder) -> Order {
    let id = raw.id.unwrap_or_else(|| {
        warn!("order payload carries no id; normalizing with the nil id");
        Uuid::nil()
    });

    let (status, reported_status) = match raw.status {
        Some(label) => match OrderStatus::parse_label(&label) {
            Some(status) => (status, label),
            None => {
                warn!(
                    order_id = %id,
                    label = %label,
                    "unrecognized order status; treating as pending"
                );
                (OrderStatus::Pending, label)
            }
        },
        None => {
            warn!(order_id = %id, "order payload carries no status; treating as pending");
            (OrderStatus::Pending, String::new())
        }
    };

    let priority = raw
        .priority
        .as_deref()
        .and_then(Priority::parse_label)
        .unwrap_or_default();
    let service = raw
        .service
        .as_deref()
        .and_then(ServiceKind::parse_label)
        .unwrap_or_default();

    let customer = normalize_customer(raw.customer.unwrap_or_default());
    let assignment = normalize_assignment(id, status, raw.driver);
    let route = normalize_route(raw.route.unwrap_or_default());
    let pricing = normalize_pricing(raw.pricing.unwrap_or_default());
    let mut timeline = normalize_timeline(raw.timeline.unwrap_or_default());
    let flags = normalize_flags(raw.flags.unwrap_or_default());

    // Terminal orders must carry their terminal timestamp even when the
    // upstream record omitted it.
    if status.is_terminal() && !timeline.terminal_recorded(status) {
        warn!(
            order_id = %id,
            status = status.label(),
            "terminal order missing its terminal timestamp; stamping now"
        );
        timeline.stamp(status, Utc::now());
    }

    Order {
        id,
        status,
        reported_status,
        priority,
        service,
        customer,
        assignment,
        route,
        pricing,
        timeline,
        flags,
    }
}

pub fn normalize_candidate(raw: RawDriverCandidate) -> NearbyDriver {
    let id = raw.id.unwrap_or_else(Uuid::nil);
    let status = raw
        .status
        .as_deref()
        .and_then(DriverStatus::parse_label)
        // Candidates arrive from an availability lookup; absent or garbled
        // status still means the platform offered them.
        .unwrap_or(DriverStatus::Online);

    NearbyDriver {
        id,
        name: raw.name.unwrap_or_default(),
        status,
        distance_m: raw.distance_m.unwrap_or(0.0).max(0.0),
        eta_secs: raw.eta_secs.unwrap_or(0),
        rating: raw.rating.unwrap_or(DEFAULT_RATING).clamp(0.0, 5.0),
        vehicle: raw
            .vehicle
            .as_deref()
            .and_then(parse_vehicle)
            .unwrap_or_default(),
        trust_score: raw
            .trust_score
            .unwrap_or(DEFAULT_TRUST_SCORE)
            .clamp(0.0, 100.0),
    }
}

fn normalize_customer(raw: RawCustomer) -> Customer {
    Customer {
        id: raw.id.unwrap_or_else(Uuid::nil),
        name: raw.name.unwrap_or_default(),
        phone: raw.phone.unwrap_or_default(),
    }
}

fn normalize_assignment(
    order_id: Uuid,
    status: OrderStatus,
    raw: Option<RawAssignedDriver>,
) -> DriverAssignment {
    match raw {
        Some(_) if status.is_assignable() => {
            warn!(
                order_id = %order_id,
                status = status.label(),
                "driver reported before assignment; dropping it"
            );
            DriverAssignment::Unassigned
        }
        Some(driver) => DriverAssignment::Assigned(AssignedDriver {
            id: driver.id.unwrap_or_else(Uuid::nil),
            name: driver.name.unwrap_or_default(),
            phone: driver.phone.unwrap_or_default(),
            vehicle: driver
                .vehicle
                .as_deref()
                .and_then(parse_vehicle)
                .unwrap_or_default(),
            rating: driver.rating.unwrap_or(DEFAULT_RATING).clamp(0.0, 5.0),
        }),
        None => {
            if !status.is_assignable() && !status.is_terminal() {
                warn!(
                    order_id = %order_id,
                    status = status.label(),
                    "order is past assignment but carries no driver"
                );
            }
            DriverAssignment::Unassigned
        }
    }
}

fn normalize_route(raw: RawRoute) -> Route {
    Route {
        pickup: point(raw.pickup),
        dropoff: point(raw.dropoff),
        pickup_address: raw.pickup_address.unwrap_or_default(),
        dropoff_address: raw.dropoff_address.unwrap_or_default(),
        estimated_distance_m: raw.estimated_distance_m.unwrap_or(0.0),
        estimated_duration_secs: raw.estimated_duration_secs.unwrap_or(0),
        actual_distance_m: raw.actual_distance_m,
        actual_duration_secs: raw.actual_duration_secs,
    }
}

fn normalize_pricing(raw: RawPricing) -> Pricing {
    Pricing {
        base_fare: raw.base_fare.unwrap_or(0.0),
        distance_fare: raw.distance_fare.unwrap_or(0.0),
        time_fare: raw.time_fare.unwrap_or(0.0),
        surge_multiplier: raw.surge_multiplier.unwrap_or(1.0),
        total: raw.total.unwrap_or(0.0),
        payment_method: raw
            .payment
            .as_deref()
            .and_then(parse_payment)
            .unwrap_or_default(),
        paid: raw.paid.unwrap_or(false),
    }
}

fn normalize_timeline(raw: RawTimeline) -> Timeline {
    Timeline {
        created_at: raw.created_at.unwrap_or_else(Utc::now),
        scheduled_at: raw.scheduled_at,
        searching_at: raw.searching_at,
        assigned_at: raw.assigned_at,
        accepted_at: raw.accepted_at,
        en_route_at: raw.en_route_at,
        arrived_at: raw.arrived_at,
        started_at: raw.started_at,
        completed_at: raw.completed_at,
        cancelled_at: raw.cancelled_at,
    }
}

fn normalize_flags(raw: RawFlags) -> OrderFlags {
    OrderFlags {
        prioritized: raw.prioritized.unwrap_or(false),
        scheduled: raw.scheduled.unwrap_or(false),
        special_requirements: raw.special_requirements.unwrap_or(false),
        requires_verification: raw.requires_verification.unwrap_or(false),
    }
}

fn point(raw: Option<RawPoint>) -> GeoPoint {
    let raw = raw.unwrap_or_default();
    GeoPoint {
        lat: raw.lat,
        lng: raw.lng,
    }
}

fn parse_vehicle(raw: &str) -> Option<VehicleType> {
    match raw.to_ascii_lowercase().as_str() {
        "sedan" | "car" => Some(VehicleType::Sedan),
        "suv" => Some(VehicleType::Suv),
        "van" => Some(VehicleType::Van),
        "motorbike" | "motorcycle" | "scooter" => Some(VehicleType::Motorbike),
        "bicycle" | "bike" => Some(VehicleType::Bicycle),
        _ => None,
    }
}

fn parse_payment(raw: &str) -> Option<PaymentMethod> {
    match raw.to_ascii_lowercase().as_str() {
        "cash" => Some(PaymentMethod::Cash),
        "card" | "credit" | "credit_card" | "creditcard" => Some(PaymentMethod::Card),
        "wallet" => Some(PaymentMethod::Wallet),
        _ => None,
    }
}
