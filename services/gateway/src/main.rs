use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tessera_core::logging;
use tessera_gateway::{config, router, state::AppState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = config::parse_config_path(&args)?;
    let config = config::load(config_path.as_deref())?;

    logging::init_from_config(&config.logging);

    let state = Arc::new(AppState::new(&config)?);
    let app = router(state);

    let bind_addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Tessera gateway listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
