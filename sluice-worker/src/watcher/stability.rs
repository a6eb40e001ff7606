//! Upload stability check

use std::path::Path;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::StabilityConfig;

/// Samples the file size until it stops changing
///
/// Returns true once `required_stable_reads` consecutive comparisons find
/// the same non-zero size as the previous sample, so three stable reads take
/// four samples. Returns false if that does not happen within
/// `max_wait`, if the file disappears, or if shutdown begins.
pub async fn wait_for_stable(
    path: &Path,
    config: &StabilityConfig,
    shutdown: &CancellationToken,
) -> bool {
    let deadline = Instant::now() + config.max_wait;
    let mut last_size = None;
    let mut stable_reads = 0;

    loop {
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => return false,
        };

        stable_reads = match (size, last_size) {
            (0, _) => 0,
            (size, Some(last)) if size == last => stable_reads + 1,
            _ => 0,
        };
        last_size = Some(size);

        if stable_reads >= config.required_stable_reads {
            return true;
        }

        if Instant::now() + config.sample_interval > deadline {
            return false;
        }

        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = time::sleep(config.sample_interval) => {}
        }
    }
}
