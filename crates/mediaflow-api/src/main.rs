#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use mediaflow_api::setup::{initialize_app, start_server};
use mediaflow_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = initialize_app(config.clone()).await?;

    start_server(&config, app).await?;

    Ok(())
}
