use std::future::Future;
use std::time::{Duration, Instant};

use tracing::Span;

use super::TraceId;

/// Root span for one pass over the asset registry.
pub fn cycle_span(cycle: u64, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "cycle",
        cycle,
        trace_id = %trace_id,
        assets = tracing::field::Empty
    )
}

/// Awaits `fut` and logs under the `performance` target when it took longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
