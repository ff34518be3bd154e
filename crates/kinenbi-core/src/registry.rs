// Source registry and date-range aggregator.
//
// Sources are queried strictly one after another, source by source within a
// date and date by date across the range, so emission order is fixed by
// registry order. A failing lookup or delivery is logged and skipped; a run
// always walks its whole range.

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use crate::sink::Sink;
use crate::source::Source;

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Tally of one `SourceRegistry::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub lookups: usize,
    pub failed_lookups: usize,
    pub emitted: usize,
    pub failed_deliveries: usize,
}

// ---------------------------------------------------------------------------
// SourceRegistry
// ---------------------------------------------------------------------------

/// Ordered set of active sources.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source. Insertion order is query and emission order.
    pub fn push(&mut self, source: impl Source + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Display names of the active sources, in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Query every source for each of `day_count` consecutive dates starting
    /// at `start`, forwarding every anniversary to `sink` as it is produced.
    pub async fn run<S: Sink + ?Sized>(&self, start: NaiveDate, day_count: u32, sink: &S) -> RunReport {
        let mut report = RunReport::default();

        for offset in 0..day_count {
            let Some(date) = start.checked_add_days(Days::new(u64::from(offset))) else {
                warn!("date range overflows after {} day(s) from {}, stopping", offset, start);
                break;
            };

            info!("=== {} ===", date.format("%Y-%m-%d"));

            for source in &self.sources {
                report.lookups += 1;
                let anniversaries = match source.lookup(date).await {
                    Ok(found) => found,
                    Err(e) => {
                        report.failed_lookups += 1;
                        warn!("Error getting anniversaries from {} for {}: {}", source.name(), date, e);
                        continue;
                    }
                };

                for anniversary in &anniversaries {
                    report.emitted += 1;
                    if let Err(e) = sink.deliver(anniversary).await {
                        report.failed_deliveries += 1;
                        warn!("Error delivering anniversary from {}: {}", anniversary.source, e);
                    }
                }
            }
        }

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
