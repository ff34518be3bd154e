// One bot run: build sources and sink from config, then walk the date range.

use chrono::NaiveDate;
use tracing::info;

use kinenbi_core::{RunReport, Sink};

use crate::config::Config;
use crate::delivery;
use crate::sources;

/// Run every active source over `config.days` days starting at `start`,
/// delivering through the sink the configuration selects.
pub async fn run(config: &Config, start: NaiveDate) -> anyhow::Result<RunReport> {
    let sink = delivery::select_sink(config)?;
    if config.delivers_to_console() {
        info!("Delivering to stdout (dry run or no webhook configured)");
    } else {
        info!("Delivering to webhook");
    }
    run_with_sink(config, start, sink.as_ref()).await
}

/// Same as [`run`] with a caller-supplied sink.
pub async fn run_with_sink<S: Sink + ?Sized>(
    config: &Config,
    start: NaiveDate,
    sink: &S,
) -> anyhow::Result<RunReport> {
    let registry = sources::build_registry(config)?;
    info!("Active sources: {}", registry.names().join(", "));

    let report = registry.run(start, config.days, sink).await;
    info!(
        "Run finished: {} lookups ({} failed), {} anniversaries emitted ({} delivery failures)",
        report.lookups, report.failed_lookups, report.emitted, report.failed_deliveries
    );
    Ok(report)
}
