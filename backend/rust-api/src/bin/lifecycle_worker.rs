use anyhow::Context;

use finwell_api::{
    config::Config,
    services::{lifecycle_worker::LifecycleWorker, AppState},
    utils::telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let provider = telemetry::init("finwell-lifecycle-worker")?;

    let config = Config::load().context("Failed to load configuration")?;
    let app_state = AppState::new(config)
        .await
        .context("Failed to initialize app state")?;

    let worker = LifecycleWorker::new(&app_state);
    let result = worker.run().await;

    telemetry::shutdown(provider);
    result
}
