use anyhow::Context as _;
use orchestrator::{
    config::{self, Config},
    consumer, engine::Engine, routes, sweeper,
};
use payline_api::{admin, server};
use payline_common::event::TOPIC_PAYMENT_CREATED;
use payline_infra::{
    bus::Bus, kv::Kv, log::{EventLog, LogConsumer}, outbox, store,
};
use payline_tokio::{notify, notify_once::NotifyOnce, signal, task};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    payline_logger::init();
    let config =
        Config::from_env().context("Bad orchestrator configuration")?;
    let metrics_handle = admin::install_metrics_recorder()?;

    let db = store::connect(&config.database_url).await?;
    let kv = Kv::connect(&config.redis_url).await?;
    let bus = Bus::connect(&config.nats_url).await?;
    let event_log = EventLog::connect(&config.redis_url).await?;
    let log_consumer = LogConsumer::connect(
        &config.redis_url,
        TOPIC_PAYMENT_CREATED,
        config::CONSUMER_GROUP,
        config::CONSUMER_NAME,
    )
    .await?;

    let shutdown = NotifyOnce::new();
    let (outbox_wake, outbox_wake_rx) = notify::channel();

    let engine = Engine::new(db.clone(), kv, bus, outbox_wake.clone());
    let router = routes::router(routes::ApiState { db: db.clone() })
        .merge(admin::routes(metrics_handle));

    let mut tasks = Vec::with_capacity(5);
    tasks.push(signal::spawn_listener(shutdown.clone()));
    let (server_task, _addr) = server::spawn_server_task(
        "orchestrator api",
        config.port,
        router,
        shutdown.clone(),
    )
    .await?;
    tasks.push(server_task);
    tasks.push(consumer::spawn_consumer(
        log_consumer,
        engine,
        shutdown.clone(),
    ));
    tasks.push(sweeper::spawn_sweeper(
        db.clone(),
        outbox_wake,
        shutdown.clone(),
    ));
    tasks.push(outbox::spawn_drainer(
        db,
        event_log,
        outbox_wake_rx,
        shutdown.clone(),
        config::OUTBOX_DRAIN_INTERVAL,
    ));

    info!("Orchestrator up");
    task::join_tasks_and_shutdown(
        "orchestrator",
        tasks,
        shutdown,
        config::SHUTDOWN_TIMEOUT,
    )
    .await;

    Ok(())
}
