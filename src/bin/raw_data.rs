use anyhow::{Context, Result};
use clap::Parser;

use exam_dashboard::config::{init_logging, RawDataArgs};
use exam_dashboard::{raw_data_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = RawDataArgs::parse();

    log::info!(
        "Starting raw-data v{} with data file {}",
        env!("CARGO_PKG_VERSION"),
        args.data.path.display()
    );

    let app = raw_data_router(AppState::new(args.data.path));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    log::info!("raw-data listening on http://{}", args.bind);

    axum::serve(listener, app).await?;
    Ok(())
}
