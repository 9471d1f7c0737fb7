use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use atrium::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config = Config::from_env();
    info!(
        target: "atrium",
        "atrium starting: RUST_LOG='{}', http_port={}, public_dir='{}', config_dir='{}'",
        rust_log,
        config.http_port,
        config.public_dir.display(),
        config.config_dir.display()
    );

    atrium::server::run(config).await
}
