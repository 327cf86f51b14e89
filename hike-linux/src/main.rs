// HikeBoard Linux: status relay daemon over UDP multicast, with a stdin console.

mod config;
mod console;
mod node;
mod store;
mod transport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use hike_core::{Address, BlobStore, CoreConfig, HikeCore, MemoryStore};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Received payloads waiting for the relay consumer.
const RX_QUEUE_DEPTH: usize = 64;

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("hike-linux {}", VERSION);
            return Ok(());
        }
    }

    let cfg = config::load();
    init_tracing(&cfg.log_level);

    let core_config = CoreConfig {
        inbox_policy: cfg.inbox_policy,
        ..CoreConfig::default()
    };
    let store: Arc<dyn BlobStore> = match store::FileStore::open(&cfg.data_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "data directory unusable, state will not survive restart");
            Arc::new(MemoryStore::new())
        }
    };
    let address = resolve_address(cfg.address, store.as_ref());
    let mut core = HikeCore::restore(address, core_config, store.as_ref());
    let seed_actions = core.seed_peers(&cfg.bootstrap_peers);
    let core = Arc::new(Mutex::new(core));
    let started = Instant::now();

    info!(
        %address,
        port = cfg.port,
        data_dir = %cfg.data_dir.display(),
        "hike-linux {} starting",
        VERSION
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        for action in seed_actions {
            node::dispatch(action, &persist_tx);
        }
        tokio::spawn(node::persist_loop(store, persist_rx));

        let socket = Arc::new(transport::make_multicast_socket(cfg.port).await?);
        let (rx_tx, rx_rx) = mpsc::channel(RX_QUEUE_DEPTH);

        let recv_socket = socket.clone();
        tokio::spawn(async move {
            if let Err(e) = transport::recv_loop(recv_socket, rx_tx).await {
                warn!(error = %e, "receive loop stopped");
            }
        });
        tokio::spawn(node::relay_loop(
            core.clone(),
            rx_rx,
            started,
            persist_tx.clone(),
        ));
        tokio::spawn(transport::broadcast_loop(
            socket,
            core.clone(),
            transport::group_addr(cfg.port),
            Duration::from_secs(cfg.broadcast_interval_secs.max(1)),
            started,
            persist_tx.clone(),
        ));
        tokio::spawn(async move {
            match console::run_console(core, started, persist_tx).await {
                Ok(()) => info!("console closed, relay keeps running"),
                Err(e) => warn!(error = %e, "console stopped"),
            }
        });

        shutdown_signal().await?;
        info!("shutting down");
        Ok::<(), anyhow::Error>(())
    })?;
    Ok(())
}

/// Configured address, else the one kept in the data directory (created on first boot).
fn resolve_address(configured: Option<Address>, store: &dyn BlobStore) -> Address {
    if let Some(a) = configured {
        return a;
    }
    match hike_core::load_or_create_address(store) {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "cannot keep device address, using a temporary one");
            Address::random_local()
        }
    }
}

/// RUST_LOG wins; otherwise the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
