use clap::Parser;
use relief_client::{logging, ClientError};
use relief_core::ReliefConfig;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "relief-client", about = "Live disaster coordination client")]
struct Args {
    /// REST base URL; the push endpoint is derived from it.
    #[arg(long)]
    api_url: Option<String>,
    /// Identity sent as X-User-ID.
    #[arg(long)]
    user_id: Option<String>,
    /// Disaster to select on startup.
    #[arg(long)]
    select: Option<String>,
    /// Run a scripted session against an in-process fixture server.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();

    let result = if args.demo {
        run_demo().await
    } else {
        run(args).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("relief-client failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let mut config = ReliefConfig::from_env()?;
    if args.api_url.is_some() || args.user_id.is_some() {
        let api_url = args.api_url.unwrap_or_else(|| config.api_url.to_string());
        let user_id = args.user_id.unwrap_or_else(|| config.user_id.clone());
        let overridden = ReliefConfig::new(&api_url, &user_id)?;
        config = ReliefConfig {
            request_timeout: config.request_timeout,
            reconnect: config.reconnect,
            ..overridden
        };
    }
    relief_client::run(config, args.select).await
}

#[cfg(feature = "demo")]
async fn run_demo() -> Result<(), ClientError> {
    let state = relief_client::run_demo().await?;
    match serde_json::to_string_pretty(&state) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to render state: {err}"),
    }
    Ok(())
}

#[cfg(not(feature = "demo"))]
async fn run_demo() -> Result<(), ClientError> {
    eprintln!("relief-client was built without the `demo` feature");
    Ok(())
}
