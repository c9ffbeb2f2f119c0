use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use aibridge_adapter::{AdapterServer, AssistantProfile, ToolContext};
use aibridge_backend::BackendClient;
use aibridge_bus::{channels, BusMessage, Coordinator};
use aibridge_core::env::AdapterEnv;
use aibridge_tasks::{BackendTaskStore, BusPublisher, TaskManager};

/// Run one adapter process: authenticate against the backend, connect to
/// the broker, then serve the tool protocol on stdio until the transport
/// closes or a termination signal arrives.
///
/// Failures in this bootstrap are fatal: the process exits non-zero and
/// the orchestrator restarts it with backoff.
pub async fn run() -> anyhow::Result<()> {
    let env = AdapterEnv::from_process_env()?;
    let profile: AssistantProfile = env.profile.parse()?;
    info!(assistant = %env.assistant, %profile, "Adapter starting");

    let backend = Arc::new(BackendClient::new(
        &env.backend_url,
        &env.api_key,
        &env.assistant,
    ));
    backend.authenticate().await?;

    let coordinator = Arc::new(Coordinator::connect(&env.broker_url, &env.assistant).await?);
    watch_channel(&coordinator, &channels::sync(&env.assistant)).await?;
    watch_channel(&coordinator, channels::COORDINATION).await?;
    watch_channel(&coordinator, channels::TASKS_ALL).await?;

    let tasks = match profile {
        AssistantProfile::Project => {
            let store = Arc::new(BackendTaskStore::new(backend.clone()));
            let publisher = Arc::new(BusPublisher::new(coordinator.clone()));
            Some(Arc::new(TaskManager::with_default_handlers(
                store, publisher,
            )))
        }
        AssistantProfile::General => None,
    };

    let ctx = ToolContext {
        assistant: env.assistant.clone(),
        backend: Some(backend),
        coordinator: Some(coordinator),
        tasks,
    };
    let server = AdapterServer::new(profile, ctx)?;

    let (shutdown_tx, _) = broadcast::channel(1);
    tokio::spawn(signal_watcher(shutdown_tx.clone()));

    server
        .run(
            tokio::io::stdin(),
            tokio::io::stdout(),
            shutdown_tx.subscribe(),
        )
        .await?;
    info!(assistant = %env.assistant, "Adapter stopped");
    Ok(())
}

/// Subscribe to a channel and log everything that arrives on it. Peer
/// events carry their own ids, so anything that needs to react further
/// can dedup on (channel, id).
async fn watch_channel(coordinator: &Arc<Coordinator>, pattern: &str) -> anyhow::Result<()> {
    let mut rx = coordinator.subscribe(pattern).await?;
    let own = coordinator.assistant().to_string();
    tokio::spawn(async move {
        while let Some(BusMessage { channel, envelope }) = rx.recv().await {
            if envelope.from == own {
                continue;
            }
            info!(
                channel = %channel,
                from = %envelope.from,
                event_id = %envelope.id,
                "Peer event"
            );
            debug!(payload = %envelope.payload, "Peer event payload");
        }
    });
    Ok(())
}

/// Resolve to shutdown on ctrl-c or (on unix) SIGTERM from the
/// orchestrator. Exiting through this path keeps the exit code at 0.
async fn signal_watcher(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => return,
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Termination signal received");
    let _ = shutdown_tx.send(());
}
