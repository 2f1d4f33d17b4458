use mid_demo::{config::Config, server::Server, setup::setup, telemetry};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        redis = config.redis.is_some(),
        "Loaded configuration"
    );

    let state = setup(&config).await?;
    let server = Server::new(state, &config.server).await?;
    server.run().await
}
