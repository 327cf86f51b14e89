//! Glue between the shared core and the host: the single receive consumer and the
//! deferred persistence writer.

use std::sync::Arc;
use std::time::Instant;

use hike_core::{BlobStore, HikeCore, OutboundAction};
use tokio::sync::{mpsc, Mutex};
use tracing::{trace, warn};

/// The one critical section: receive handling, broadcasts and console commands all lock it.
pub type SharedCore = Arc<Mutex<HikeCore>>;

/// Hand a core action to the host side. Persistence goes to the writer task so no file I/O
/// happens while the core is locked.
pub fn dispatch(action: OutboundAction, persist_tx: &mpsc::UnboundedSender<OutboundAction>) {
    match action {
        OutboundAction::Persist { .. } => {
            if persist_tx.send(action).is_err() {
                warn!("persistence writer stopped, dropping write");
            }
        }
        OutboundAction::Broadcast(_) => trace!("broadcast deferred to next cycle"),
    }
}

/// Drain received payloads one at a time under the core lock.
pub async fn relay_loop(
    core: SharedCore,
    mut rx: mpsc::Receiver<Vec<u8>>,
    started: Instant,
    persist_tx: mpsc::UnboundedSender<OutboundAction>,
) {
    while let Some(payload) = rx.recv().await {
        let actions = {
            let mut c = core.lock().await;
            c.set_uptime(started.elapsed());
            c.on_receive(&payload)
        };
        for action in actions {
            dispatch(action, &persist_tx);
        }
    }
}

/// Apply blob writes in order. Failures are logged, not retried; the next mutation
/// rewrites the whole blob anyway.
pub async fn persist_loop(store: Arc<dyn BlobStore>, mut rx: mpsc::UnboundedReceiver<OutboundAction>) {
    while let Some(action) = rx.recv().await {
        let OutboundAction::Persist { blob, bytes } = action else {
            continue;
        };
        let store = store.clone();
        let result = tokio::task::spawn_blocking(move || store.save(blob, &bytes)).await;
        match result {
            Ok(Ok(())) => trace!(blob = blob.name(), "blob written"),
            Ok(Err(e)) => warn!(blob = blob.name(), error = %e, "blob write failed"),
            Err(e) => warn!(blob = blob.name(), error = %e, "blob writer panicked"),
        }
    }
}
