use anyhow::Context as _;
use ledger::{
    config::{self, Config},
    consumer, routes, store as ledger_store,
};
use payline_api::{admin, server};
use payline_common::event::TOPIC_PAYMENT_STATE_CHANGED;
use payline_infra::{log::LogConsumer, store};
use payline_tokio::{notify_once::NotifyOnce, signal, task};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    payline_logger::init();
    let config = Config::from_env().context("Bad ledger configuration")?;
    let metrics_handle = admin::install_metrics_recorder()?;

    let db = store::connect(&config.database_url).await?;
    ledger_store::bootstrap_platform_account(&db)
        .await
        .context("Could not seed the platform account")?;
    let log_consumer = LogConsumer::connect(
        &config.redis_url,
        TOPIC_PAYMENT_STATE_CHANGED,
        config::CONSUMER_GROUP,
        config::CONSUMER_NAME,
    )
    .await?;

    let shutdown = NotifyOnce::new();

    let router = routes::router(routes::ApiState { db: db.clone() })
        .merge(admin::routes(metrics_handle));

    let mut tasks = Vec::with_capacity(3);
    tasks.push(signal::spawn_listener(shutdown.clone()));
    let (server_task, _addr) = server::spawn_server_task(
        "ledger api",
        config.port,
        router,
        shutdown.clone(),
    )
    .await?;
    tasks.push(server_task);
    tasks.push(consumer::spawn_consumer(log_consumer, db, shutdown.clone()));

    info!("Ledger up");
    task::join_tasks_and_shutdown(
        "ledger",
        tasks,
        shutdown,
        config::SHUTDOWN_TIMEOUT,
    )
    .await;

    Ok(())
}
