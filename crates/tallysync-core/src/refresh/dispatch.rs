// ── Bus → registry dispatcher ──

use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::RefreshRegistry;
use crate::bus::EventBus;

/// Spawn the task that feeds bus events into `registry`.
///
/// Events are read in publish order and each fan-out runs in its own
/// task, so a slow view delays only its own refresh. If the bus drops
/// events, every view is refreshed since there is no way to know which
/// ones missed their event. Fan-outs still running at cancellation are
/// aborted.
pub fn spawn_dispatcher(
    registry: RefreshRegistry,
    bus: &EventBus,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut events = bus.subscribe();

    tokio::spawn(async move {
        let mut fan_outs = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(done) = fan_outs.join_next(), if !fan_outs.is_empty() => {
                    if let Err(e) = done {
                        warn!(error = %e, "refresh fan-out ended abnormally");
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        let registry = registry.clone();
                        fan_outs.spawn(async move {
                            if let Some(summary) = registry.dispatch(&event).await {
                                debug!(?summary, "dispatched bus event");
                            }
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dispatcher lagged, refreshing all views");
                        let registry = registry.clone();
                        fan_outs.spawn(async move {
                            registry.refresh_all().await;
                        });
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        fan_outs.shutdown().await;
        debug!("refresh dispatcher exiting");
    })
}
