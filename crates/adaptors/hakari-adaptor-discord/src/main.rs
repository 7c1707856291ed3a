//! Hakari bot entry point

use tracing_subscriber::EnvFilter;

use hakari_adaptor_discord::HakariConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HakariConfig::from_env()?;
    hakari_adaptor_discord::run(config).await
}
