use crate::models::order::{Order, OrderStatus};

/// Console tabs are a pure view over whatever page is on hand; switching tabs
/// never triggers a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTab {
    All,
    Active,
    Completed,
    Cancelled,
}

impl OrderTab {
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            OrderTab::All => true,
            OrderTab::Active => !status.is_terminal(),
            OrderTab::Completed => {
                matches!(status, OrderStatus::Completed | OrderStatus::Delivered)
            }
            OrderTab::Cancelled => status == OrderStatus::Cancelled,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderTab::All => "all",
            OrderTab::Active => "active",
            OrderTab::Completed => "completed",
            OrderTab::Cancelled => "cancelled",
        }
    }
}

pub fn tab_items<'a>(orders: &'a [Order], tab: OrderTab) -> Vec<&'a Order> {
    orders.iter().filter(|o| tab.matches(o.status)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
}

pub fn tab_counts(orders: &[Order]) -> TabCounts {
    let mut counts = TabCounts::default();
    for order in orders {
        counts.all += 1;
        match order.status {
            OrderStatus::Completed | OrderStatus::Delivered => counts.completed += 1,
            OrderStatus::Cancelled => counts.cancelled += 1,
            _ => counts.active += 1,
        }
    }
    counts
}
