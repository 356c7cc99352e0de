use std::sync::Arc;

use token_gate::{build_app, Auth, Config, StaticCredentials};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    // Prefer RUST_LOG if set, e.g. RUST_LOG=info,token_gate=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let credentials = Arc::new(StaticCredentials::new(
        config.login_username.clone(),
        config.login_password.clone(),
        config.login_account_number.clone(),
    ));
    let auth = Auth::new(config.auth_config(credentials))?;

    tracing::info!(
        addr = %config.addr,
        algorithm = ?config.token_algorithm,
        ttl_seconds = config.token_ttl.as_secs(),
        "starting token gate"
    );

    warp::serve(build_app(&auth)).run(config.addr).await;

    Ok(())
}
