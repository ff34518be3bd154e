// Today-in-history bot entry point.
//
// Startup sequence:
// 1. Load `.env` if present
// 2. Initialize tracing (stderr; stdout carries dry-run output)
// 3. Load config
// 4. Run every active source over today plus the configured number of days

use kinenbi_app::app;
use kinenbi_app::config;

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. A missing .env file is normal in production.
    let dotenv = dotenvy::dotenv();

    // 2. Initialize tracing
    init_tracing()?;
    info!("Today-in-History bot starting up");
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // 3. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: dataset={}, {} day(s), dry_run={}",
        config.dataset_path.display(),
        config.days,
        config.dry_run
    );

    // 4. Run
    let today = chrono::Local::now().date_naive();
    app::run(&config, today).await.context("run failed")?;

    info!("Bot completed successfully");
    Ok(())
}

/// Initialize tracing to stderr, filtered by `RUST_LOG`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kinenbi=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
