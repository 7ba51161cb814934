//! Fire-and-forget delivery to backend sinks.

use std::future::Future;

use tp_domain::error::Result;
use tp_domain::trace::TraceEvent;

/// Await `fut`; on failure log it with a `SinkFailed` event and return
/// `None`. A sink failure never aborts the turn.
pub async fn best_effort<T>(
    sink: &str,
    channel_id: Option<&str>,
    fut: impl Future<Output = Result<T>>,
) -> Option<T> {
    match fut.await {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(sink, channel_id, error = %e, "sink call failed");
            TraceEvent::SinkFailed {
                sink: sink.to_owned(),
                channel_id: channel_id.map(str::to_owned),
                error: e.to_string(),
            }
            .emit();
            None
        }
    }
}
