use anyhow::Context as _;
use fraud::{config::Config, responder, routes};
use payline_api::{admin, server};
use payline_common::event::SUBJECT_FRAUD_CHECK;
use payline_infra::{bus::Bus, kv::Kv, store};
use payline_tokio::{notify_once::NotifyOnce, signal, task};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    payline_logger::init();
    let config = Config::from_env().context("Bad fraud configuration")?;
    let metrics_handle = admin::install_metrics_recorder()?;

    let db = store::connect(&config.database_url).await?;
    let kv = Kv::connect(&config.redis_url).await?;
    let bus = Bus::connect(&config.nats_url).await?;
    let subscription = bus
        .subscribe(SUBJECT_FRAUD_CHECK)
        .await
        .context("Could not subscribe to fraud.check")?;

    let shutdown = NotifyOnce::new();

    let router = routes::router(routes::ApiState { db: db.clone() })
        .merge(admin::routes(metrics_handle));

    let mut tasks = Vec::with_capacity(3);
    tasks.push(signal::spawn_listener(shutdown.clone()));
    let (server_task, _addr) = server::spawn_server_task(
        "fraud api",
        config.port,
        router,
        shutdown.clone(),
    )
    .await?;
    tasks.push(server_task);
    tasks.push(responder::spawn_responder(
        subscription,
        db,
        kv,
        shutdown.clone(),
    ));

    info!("Fraud evaluator up");
    task::join_tasks_and_shutdown(
        "fraud",
        tasks,
        shutdown,
        fraud::config::SHUTDOWN_TIMEOUT,
    )
    .await;

    Ok(())
}
