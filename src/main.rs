use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use slotbook::clock::SystemClock;
use slotbook::compactor::run_compactor;
use slotbook::config::Config;
use slotbook::durable::WalStore;
use slotbook::engine::Engine;
use slotbook::model::Topic;
use slotbook::publisher::EventPublisher;
use slotbook::store::{AppointmentStore, InMemoryStore, ServiceStore};
use slotbook::transport::BroadcastTransport;

/// Log every event seen on `topic` until the channel closes.
fn spawn_event_logger(transport: &BroadcastTransport, topic: Topic) {
    let mut rx = transport.subscribe(topic);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(topic = topic.as_str(), "change event {json}"),
                    Err(e) => tracing::warn!(
                        topic = topic.as_str(),
                        id = %event.payload.id(),
                        "change event not serializable: {e}"
                    ),
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(topic = topic.as_str(), "event logger lagged by {n} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    slotbook::observability::init(config.metrics_port)?;

    let (appointments, services): (Arc<dyn AppointmentStore>, Arc<dyn ServiceStore>) =
        if config.durable {
            std::fs::create_dir_all(&config.data_dir)?;
            let store = Arc::new(WalStore::open(&config.wal_path()).await?);
            tokio::spawn(run_compactor(store.clone(), config.compact_threshold));
            (store.clone(), store)
        } else {
            let store = Arc::new(InMemoryStore::new());
            (store.clone(), store)
        };

    let transport = Arc::new(BroadcastTransport::new(config.event_channel_capacity));
    spawn_event_logger(&transport, Topic::AppointmentChanged);
    spawn_event_logger(&transport, Topic::ServiceChanged);

    let publisher = EventPublisher::new(transport.clone(), Arc::new(SystemClock));
    // Composition root: callers embed the engine; this binary owns it until shutdown.
    let engine = Engine::new(appointments, services, publisher);

    info!("slotbook ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  durable: {}", config.durable);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Wait for SIGTERM/ctrl-c
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    drop(engine);
    info!("slotbook stopped");
    Ok(())
}
