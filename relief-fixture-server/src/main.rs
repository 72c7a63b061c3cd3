use relief_fixture_server::{spawn, FixtureState};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RELIEF_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let addr: SocketAddr = std::env::var("RELIEF_FIXTURE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.into())
        .parse()?;

    let (local, server) = spawn(addr, FixtureState::seeded()).await?;
    println!("relief-fixture-server listening on {local}");
    server.await?;
    Ok(())
}
