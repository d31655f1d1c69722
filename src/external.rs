use tracing::{error, info, warn};

/// Console operations subject to host permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewOrders,
    AssignOrders,
    CancelOrders,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ViewOrders => "view_orders",
            Action::AssignOrders => "assign_orders",
            Action::CancelOrders => "cancel_orders",
        }
    }
}

/// Host-supplied permission check, consulted before any mutating call leaves
/// the console.
pub trait PermissionGate: Send + Sync {
    fn allows(&self, action: Action) -> bool;
}

/// Grants everything. The default for single-operator deployments.
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn allows(&self, _action: Action) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

/// Outcome sink for operations the host surfaces to the operator.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Routes notices into the log stream.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => info!(notice = message, "operation succeeded"),
            NoticeKind::Warning => warn!(notice = message, "operation degraded"),
            NoticeKind::Error => error!(notice = message, "operation failed"),
        }
    }
}
