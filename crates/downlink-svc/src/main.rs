use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use downlink_svc::config::Config;
use downlink_svc::repository::InMemoryDownlinkRepository;
use downlink_svc::service::DownlinkService;
use downlink_svc::state::AppState;
use iot_domain::clock::SystemClock;
use iot_domain::http_fetcher::ReqwestFetcher;
use iot_domain::publisher::LocalPublisher;
use iot_scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "downlink-svc")]
struct Cli {
    #[arg(long, env = "DOWNLINK_SVC_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("DOWNLINK_SVC_LOG_FORMAT").as_deref() == Ok("json") {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load(&cli.config).context("loading configuration")?;
    tracing::info!(bind = %config.server.bind, "configuration loaded");

    let repository = Arc::new(InMemoryDownlinkRepository::new(
        &config.repository.state_dir,
    ));
    let scheduler = Arc::new(Scheduler::new());
    let authorizer = Arc::new(config.authorizer.clone());
    let fetcher = Arc::new(ReqwestFetcher::new());
    let publisher = Arc::new(LocalPublisher::new());
    let events_rx = publisher.subscribe();
    let clock = Arc::new(SystemClock);

    let service = Arc::new(DownlinkService::new(
        repository, scheduler, authorizer, fetcher, publisher, clock,
    ));
    tokio::spawn(iot_domain::events::run(events_rx, service.clone()));
    service
        .load_and_schedule_at_boot()
        .await
        .context("scheduling persisted downlinks")?;

    let state = AppState {
        service: service.clone(),
    };
    let app = downlink_svc::api::router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .context("binding listener")?;
    tracing::info!("downlink-svc listening");

    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        service.shutdown();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
