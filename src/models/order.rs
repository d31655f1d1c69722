use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::VehicleType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Scheduled,
    Searching,
    Assigned,
    Accepted,
    EnRoute,
    Arrived,
    OnTrip,
    InTransit,
    Completed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses never transition again; polling must not outlive them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Delivered | OrderStatus::Cancelled
        )
    }

    /// The set of statuses the detail view keeps refreshing on.
    pub fn keeps_polling(&self) -> bool {
        matches!(
            self,
            OrderStatus::Searching
                | OrderStatus::Assigned
                | OrderStatus::Accepted
                | OrderStatus::EnRoute
                | OrderStatus::Arrived
                | OrderStatus::OnTrip
        )
    }

    /// Statuses an operator may still bind a driver to.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Scheduled | OrderStatus::Searching
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Scheduled => "Scheduled",
            OrderStatus::Searching => "Searching",
            OrderStatus::Assigned => "Assigned",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::EnRoute => "EnRoute",
            OrderStatus::Arrived => "Arrived",
            OrderStatus::OnTrip => "OnTrip",
            OrderStatus::InTransit => "InTransit",
            OrderStatus::Completed => "Completed",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Tolerant parse of upstream status labels (case and separator variations).
    /// Returns `None` for labels the console does not recognize.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "pending" => Some(OrderStatus::Pending),
            "scheduled" => Some(OrderStatus::Scheduled),
            "searching" => Some(OrderStatus::Searching),
            "assigned" => Some(OrderStatus::Assigned),
            "accepted" => Some(OrderStatus::Accepted),
            "enroute" => Some(OrderStatus::EnRoute),
            "arrived" => Some(OrderStatus::Arrived),
            "ontrip" => Some(OrderStatus::OnTrip),
            "intransit" => Some(OrderStatus::InTransit),
            "completed" => Some(OrderStatus::Completed),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServiceKind {
    #[default]
    Ride,
    Delivery,
}

impl ServiceKind {
    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "ride" => Some(ServiceKind::Ride),
            "delivery" => Some(ServiceKind::Delivery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Wallet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedDriver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle: VehicleType,
    pub rating: f64,
}

/// A driver is present if and only if assignment has occurred; no bare nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriverAssignment {
    Unassigned,
    Assigned(AssignedDriver),
}

impl DriverAssignment {
    pub fn is_assigned(&self) -> bool {
        matches!(self, DriverAssignment::Assigned(_))
    }

    pub fn driver(&self) -> Option<&AssignedDriver> {
        match self {
            DriverAssignment::Unassigned => None,
            DriverAssignment::Assigned(driver) => Some(driver),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub estimated_distance_m: f64,
    pub estimated_duration_secs: u32,
    pub actual_distance_m: Option<f64>,
    pub actual_duration_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surge_multiplier: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub paid: bool,
}

/// Lifecycle timestamps. Append-only: a stage timestamp is written once and
/// never overwritten by later observations of the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub searching_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub en_route_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Timeline {
    pub fn starting_at(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            scheduled_at: None,
            searching_at: None,
            assigned_at: None,
            accepted_at: None,
            en_route_at: None,
            arrived_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::Pending => return,
            OrderStatus::Scheduled => &mut self.scheduled_at,
            OrderStatus::Searching => &mut self.searching_at,
            OrderStatus::Assigned => &mut self.assigned_at,
            OrderStatus::Accepted => &mut self.accepted_at,
            OrderStatus::EnRoute => &mut self.en_route_at,
            OrderStatus::Arrived => &mut self.arrived_at,
            OrderStatus::OnTrip | OrderStatus::InTransit => &mut self.started_at,
            OrderStatus::Completed | OrderStatus::Delivered => &mut self.completed_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
        };

        if slot.is_none() {
            *slot = Some(at);
        }
    }

    /// Whether the timestamp implied by a terminal status has been recorded.
    pub fn terminal_recorded(&self, status: OrderStatus) -> bool {
        match status {
            OrderStatus::Completed | OrderStatus::Delivered => self.completed_at.is_some(),
            OrderStatus::Cancelled => self.cancelled_at.is_some(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderFlags {
    pub prioritized: bool,
    pub scheduled: bool,
    pub special_requirements: bool,
    pub requires_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    /// Verbatim upstream status label, kept for pass-through writes even when
    /// the label did not parse to a known status.
    pub reported_status: String,
    pub priority: Priority,
    pub service: ServiceKind,
    pub customer: Customer,
    pub assignment: DriverAssignment,
    pub route: Route,
    pub pricing: Pricing,
    pub timeline: Timeline,
    pub flags: OrderFlags,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{OrderStatus, Priority, Timeline};

    #[test]
    fn terminal_set_is_exactly_completed_delivered_cancelled() {
        let terminal = [
            OrderStatus::Completed,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];
        let live = [
            OrderStatus::Pending,
            OrderStatus::Scheduled,
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::OnTrip,
            OrderStatus::InTransit,
        ];

        for status in terminal {
            assert!(status.is_terminal(), "{status:?} should be terminal");
        }
        for status in live {
            assert!(!status.is_terminal(), "{status:?} should not be terminal");
        }
    }

    #[test]
    fn polling_set_matches_the_active_statuses() {
        let polled = [
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::OnTrip,
        ];
        let idle = [
            OrderStatus::Pending,
            OrderStatus::Scheduled,
            OrderStatus::InTransit,
            OrderStatus::Completed,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];

        for status in polled {
            assert!(status.keeps_polling(), "{status:?} should keep polling");
        }
        for status in idle {
            assert!(!status.keeps_polling(), "{status:?} should stop polling");
        }
    }

    #[test]
    fn assignable_set_covers_pre_dispatch_statuses() {
        assert!(OrderStatus::Pending.is_assignable());
        assert!(OrderStatus::Scheduled.is_assignable());
        assert!(OrderStatus::Searching.is_assignable());
        assert!(!OrderStatus::Assigned.is_assignable());
        assert!(!OrderStatus::Cancelled.is_assignable());
    }

    #[test]
    fn parse_label_tolerates_case_and_separators() {
        assert_eq!(
            OrderStatus::parse_label("EN_ROUTE"),
            Some(OrderStatus::EnRoute)
        );
        assert_eq!(
            OrderStatus::parse_label("on-trip"),
            Some(OrderStatus::OnTrip)
        );
        assert_eq!(
            OrderStatus::parse_label("In Transit"),
            Some(OrderStatus::InTransit)
        );
        assert_eq!(
            OrderStatus::parse_label("canceled"),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(OrderStatus::parse_label("teleporting"), None);
    }

    #[test]
    fn labels_round_trip_through_parse() {
        let all = [
            OrderStatus::Pending,
            OrderStatus::Scheduled,
            OrderStatus::Searching,
            OrderStatus::Assigned,
            OrderStatus::Accepted,
            OrderStatus::EnRoute,
            OrderStatus::Arrived,
            OrderStatus::OnTrip,
            OrderStatus::InTransit,
            OrderStatus::Completed,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];
        for status in all {
            assert_eq!(OrderStatus::parse_label(status.label()), Some(status));
        }
    }

    #[test]
    fn priority_parse_defaults_nowhere() {
        assert_eq!(Priority::parse_label("URGENT"), Some(Priority::Urgent));
        assert_eq!(Priority::parse_label("chill"), None);
    }

    #[test]
    fn timeline_stamp_is_append_only() {
        let created = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let first = Utc.with_ymd_and_hms(2024, 5, 10, 9, 5, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();

        let mut timeline = Timeline::starting_at(created);
        timeline.stamp(OrderStatus::Assigned, first);
        timeline.stamp(OrderStatus::Assigned, second);

        assert_eq!(timeline.assigned_at, Some(first));
    }

    #[test]
    fn terminal_recorded_checks_the_matching_slot() {
        let created = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let mut timeline = Timeline::starting_at(created);

        assert!(!timeline.terminal_recorded(OrderStatus::Completed));
        timeline.stamp(OrderStatus::Completed, created);
        assert!(timeline.terminal_recorded(OrderStatus::Completed));
        assert!(!timeline.terminal_recorded(OrderStatus::Cancelled));
    }
}
