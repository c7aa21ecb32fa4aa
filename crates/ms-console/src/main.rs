//! Console binary entry point

use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ms_client_api::ClientApi;
use ms_console::{init_logging, App, Args, ConsoleConfig};
use ms_rest_client_mock::MockClient;
use tracing::info;

async fn run(args: Args) -> anyhow::Result<()> {
    let config = ConsoleConfig::from_args(args)?;
    init_logging(&config)?;

    let session = config.session();
    let client: Arc<dyn ClientApi> = if config.demo {
        info!("running against built-in sample data");
        Arc::new(MockClient::demo())
    } else {
        info!(server = %config.server_url, "connecting");
        Arc::new(config.rest_client(session.clone())?)
    };

    let mut app = App::new(&config, client, session).context("failed to initialize terminal")?;
    app.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("metascan: {e:#}");
        process::exit(1);
    }
}
