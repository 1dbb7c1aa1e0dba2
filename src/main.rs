use feature_store::config::AppConfig;
use log::info;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Info by default, RUST_LOG overrides
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded: server={}:{}, lock timeout={:?}",
        config.server.host,
        config.server.port,
        config.acquire_timeout()
    );

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    feature_store::serve(listener, &config).await?;

    Ok(())
}
