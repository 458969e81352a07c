use cotalk::config;
use cotalk::err::FatalErr;
use cotalk::request::Handler;
use cotalk::response::hub::{broadcast_channel, Hub};
use cotalk::response::redis::{RedisPublisher, TopicBridge};
use cotalk::store::{PgPool, Store};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::{task, time};
use warp::Filter;

/// How long open connections get to finish once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), FatalErr> {
    config::merge_dotenv()?;
    pretty_env_logger::try_init()?;
    let (postgres_cfg, redis_cfg, cfg) = config::from_env(dotenv::vars().collect())?;
    let pod = cfg.pod_name.resolve();
    log::info!("Starting the relay on pod {}", pod);

    // the postgres client runs its own runtime, so it is built and dropped off this one
    let store: Arc<dyn Store> =
        Arc::new(task::spawn_blocking(move || PgPool::new(&postgres_cfg)).await??);

    let hub = Hub::new(*cfg.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (input, broadcaster) = broadcast_channel(Arc::clone(&hub), *cfg.broadcast_buffer);
    let broadcaster = task::spawn(broadcaster.run(shutdown_rx.clone()));
    let bridge = task::spawn(TopicBridge::new(&redis_cfg, input).run(shutdown_rx.clone()));

    let mut stopping = shutdown_rx.clone();
    let handler = Handler::new(
        Arc::clone(&store),
        Arc::new(RedisPublisher::new(&redis_cfg)),
        Arc::clone(&hub),
        &pod,
        *cfg.keepalive,
        shutdown_rx,
    );

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(cfg.cors.allowed_methods.clone())
        .allow_headers(cfg.cors.allowed_headers.clone());
    let routes = handler
        .routes()
        .or(warp::fs::dir((*cfg.static_dir).clone()))
        .with(cors);

    let server_addr = SocketAddr::new(*cfg.address, *cfg.port);
    let (server_addr, server) =
        warp::serve(routes).try_bind_with_graceful_shutdown(server_addr, async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Could not listen for ctrl-c: {}", e);
            }
            log::info!("Shutting down");
            shutdown_tx.send(true).unwrap_or_default();
        })?;

    log::info!("Listening on {}", server_addr);
    tokio::select! {
        _ = server => {}
        _ = async {
            stopping.changed().await.unwrap_or_default();
            time::sleep(SHUTDOWN_GRACE).await;
        } => log::warn!("Stopped waiting for clients that are not reading their streams"),
    }

    let released = hub.close_all();
    bridge.await?;
    broadcaster.await?;
    log::info!("Released {} remaining client(s); final counters: {:?}", released, hub.stats());

    drop(handler);
    task::spawn_blocking(move || drop(store)).await?;
    Ok(())
}
