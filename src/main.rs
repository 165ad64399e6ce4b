use anyhow::{Context, Result};
use clap::Parser;

use exam_dashboard::config::{init_logging, DashboardArgs};
use exam_dashboard::{dashboard_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = DashboardArgs::parse();

    log::info!(
        "Starting exam-dashboard v{} with data file {}",
        env!("CARGO_PKG_VERSION"),
        args.data.path.display()
    );
    if !args.data.path.exists() {
        log::warn!("{} does not exist yet; requests will fail until it does", args.data.path.display());
    }

    let app = dashboard_router(AppState::new(args.data.path));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    log::info!("exam-dashboard listening on http://{}", args.bind);

    axum::serve(listener, app).await?;
    Ok(())
}
