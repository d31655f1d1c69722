use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::QueryCache;
use crate::models::order::{Order, OrderStatus};
use crate::observability::metrics::Metrics;
use crate::transport::{DataSource, OrderTransport};

/// A status change observed between two consecutive fetches of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Remembers the previously observed status of the order one watch follows.
/// Each watch owns its own tracker, so two watches on the same order cannot
/// contaminate each other's transitions.
#[derive(Debug, Default)]
pub struct StatusTracker {
    last: Option<OrderStatus>,
}

impl StatusTracker {
    pub fn observe(&mut self, status: OrderStatus) -> Option<StatusChange> {
        let change = match self.last {
            Some(prev) if prev != status => Some(StatusChange {
                from: prev,
                to: status,
            }),
            _ => None,
        };
        self.last = Some(status);
        change
    }
}

#[derive(Debug, Clone)]
pub struct DetailState {
    pub order: Order,
    pub source: DataSource,
    pub transition: Option<StatusChange>,
    pub fetched_at: DateTime<Utc>,
}

/// Handle to a running detail poll loop. Dropping the handle (or the stream
/// made from it) stops the loop at its next wakeup.
pub struct DetailWatch {
    rx: watch::Receiver<Option<DetailState>>,
    task: JoinHandle<()>,
}

impl DetailWatch {
    /// Most recently published state, if any fetch has landed yet.
    pub fn state(&self) -> Option<DetailState> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published state. Returns None once the loop has
    /// stopped and every published state has been seen.
    pub async fn next_update(&mut self) -> Option<DetailState> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }

    /// The stream yields the current value first, then every later update.
    pub fn into_stream(self) -> WatchStream<Option<DetailState>> {
        WatchStream::new(self.rx)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the poll loop to stop: terminal status, fatal error, or all
    /// receivers dropped.
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Stops the loop now and waits for it to wind down.
    pub async fn stop(self) {
        drop(self.rx);
        let _ = self.task.await;
    }
}

pub(crate) fn spawn_watch(
    transport: Arc<dyn OrderTransport>,
    cache: Arc<QueryCache>,
    metrics: Metrics,
    id: Uuid,
    poll_interval: Duration,
) -> DetailWatch {
    let (tx, rx) = watch::channel(None);
    metrics.active_detail_watches.inc();

    let task = tokio::spawn(async move {
        let mut tracker = StatusTracker::default();
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!(order_id = %id, "detail watch dropped; polling stops");
                    break;
                }
                _ = ticker.tick() => {}
            }

            match transport.get_order(id).await {
                Ok(fetched) => {
                    metrics
                        .detail_fetches_total
                        .with_label_values(&[fetched.source.as_str()])
                        .inc();
                    cache.store_detail(&fetched.value, fetched.source);

                    let status = fetched.value.status;
                    let transition = tracker.observe(status);
                    if let Some(change) = transition {
                        metrics.poll_transitions_total.inc();
                        info!(
                            order_id = %id,
                            from = change.from.label(),
                            to = change.to.label(),
                            "order status changed"
                        );
                    }

                    let state = DetailState {
                        order: fetched.value,
                        source: fetched.source,
                        transition,
                        fetched_at: Utc::now(),
                    };
                    if tx.send(Some(state)).is_err() {
                        break;
                    }

                    if !status.keeps_polling() {
                        debug!(
                            order_id = %id,
                            status = status.label(),
                            "status left the active set; polling stops"
                        );
                        break;
                    }
                }
                Err(err) if err.is_transient() => {
                    // Keep the last published state and try again next tick.
                    metrics
                        .detail_fetches_total
                        .with_label_values(&["error"])
                        .inc();
                    warn!(order_id = %id, error = %err, "detail poll failed; retrying");
                }
                Err(err) => {
                    metrics
                        .detail_fetches_total
                        .with_label_values(&["error"])
                        .inc();
                    warn!(order_id = %id, error = %err, "detail poll stopped");
                    break;
                }
            }
        }

        metrics.active_detail_watches.dec();
    });

    DetailWatch { rx, task }
}
