use anyhow::Context as _;
use ingress::{config::Config, routes, IngressState};
use payline_api::{admin, server};
use payline_infra::{kv::Kv, log::EventLog, outbox, store};
use payline_tokio::{notify, notify_once::NotifyOnce, signal, task};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    payline_logger::init();
    let config = Config::from_env().context("Bad ingress configuration")?;
    let metrics_handle = admin::install_metrics_recorder()?;

    let db = store::connect(&config.database_url).await?;
    let kv = Kv::connect(&config.redis_url).await?;
    let event_log = EventLog::connect(&config.redis_url).await?;

    let shutdown = NotifyOnce::new();
    let (outbox_wake, outbox_wake_rx) = notify::channel();

    let state = IngressState {
        db: db.clone(),
        kv,
        outbox_wake,
    };
    let router = routes::router(state).merge(admin::routes(metrics_handle));

    let mut tasks = Vec::with_capacity(3);
    tasks.push(signal::spawn_listener(shutdown.clone()));
    let (server_task, _addr) = server::spawn_server_task(
        "ingress api",
        config.port,
        router,
        shutdown.clone(),
    )
    .await?;
    tasks.push(server_task);
    tasks.push(outbox::spawn_drainer(
        db,
        event_log,
        outbox_wake_rx,
        shutdown.clone(),
        ingress::config::OUTBOX_DRAIN_INTERVAL,
    ));

    info!("Ingress up");
    task::join_tasks_and_shutdown(
        "ingress",
        tasks,
        shutdown,
        ingress::config::SHUTDOWN_TIMEOUT,
    )
    .await;

    Ok(())
}
