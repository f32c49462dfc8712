//
// config.rs
// Image-Tools-rs
//
// Tunables for a batch run: pool sizes, the negate size threshold, the completion wait, and the cancel key.
//

use std::time::Duration;

use crate::cancel::ESCAPE;
use crate::negate::PARALLEL_THRESHOLD;

/// Default bounded wait for all submitted jobs.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Batch pool size; `0` uses the hardware parallelism.
    pub workers: usize,
    /// Per-image negate pool size; `0` uses the hardware parallelism.
    pub image_workers: usize,
    pub parallel_threshold: u64,
    pub completion_timeout: Duration,
    pub cancel_key: u8,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            image_workers: 0,
            parallel_threshold: PARALLEL_THRESHOLD,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            cancel_key: ESCAPE,
        }
    }
}

impl BatchConfig {
    pub fn batch_workers(&self) -> usize {
        resolve_workers(self.workers)
    }

    pub fn negate_workers(&self) -> usize {
        resolve_workers(self.image_workers)
    }
}

/// Number of execution units the host reports as concurrently schedulable.
pub fn hardware_parallelism() -> usize {
    num_cpus::get().max(1)
}

fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        hardware_parallelism()
    } else {
        requested
    }
}
