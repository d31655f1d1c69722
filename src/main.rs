use std::sync::Arc;

use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use dispatch_console::config::Config;
use dispatch_console::error::ConsoleError;
use dispatch_console::external::{AllowAll, TracingNotifier};
use dispatch_console::query::tabs;
use dispatch_console::session::ConsoleSession;
use dispatch_console::transport::OrderFilters;

#[tokio::main]
async fn main() -> Result<(), ConsoleError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let session = ConsoleSession::new(&config, Arc::new(AllowAll), Arc::new(TracingNotifier))?;

    let filters = OrderFilters {
        page_size: config.page_size,
        ..OrderFilters::default()
    };
    let page = session.queries().orders(&filters).await?;
    let counts = tabs::tab_counts(&page.items);
    tracing::info!(
        total = page.total,
        page = page.page,
        source = page.source.as_str(),
        active = counts.active,
        completed = counts.completed,
        cancelled = counts.cancelled,
        "order book loaded"
    );

    let Some(watched) = page.items.iter().find(|o| o.status.keeps_polling()) else {
        tracing::info!("no active orders to watch; exiting");
        return Ok(());
    };
    tracing::info!(
        order_id = %watched.id,
        status = watched.status.label(),
        "watching order until it settles"
    );

    let mut updates = session.queries().watch_order(watched.id).into_stream();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            update = updates.next() => {
                match update {
                    Some(Some(state)) => {
                        if let Some(change) = state.transition {
                            tracing::info!(
                                order_id = %state.order.id,
                                from = change.from.label(),
                                to = change.to.label(),
                                "status change"
                            );
                        } else {
                            tracing::info!(
                                order_id = %state.order.id,
                                status = state.order.status.label(),
                                source = state.source.as_str(),
                                "order state"
                            );
                        }
                    }
                    // Initial empty value before the first fetch lands.
                    Some(None) => {}
                    None => {
                        tracing::info!("watch finished");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
