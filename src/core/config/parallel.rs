//! Parallel processing configuration.

use serde::{Deserialize, Serialize};

/// Controls the rayon pool used for per-slice preprocessing and resampling.
///
/// `max_threads` comes from the `device.num_workers` entry of the config file.
/// A value of zero means "use rayon's default".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParallelPolicy {
    /// Maximum number of threads to use for parallel processing.
    #[serde(default)]
    pub max_threads: Option<usize>,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the policy from a worker count, treating zero as "default".
    pub fn from_num_workers(num_workers: usize) -> Self {
        Self {
            max_threads: (num_workers > 0).then_some(num_workers),
        }
    }

    /// Install the global rayon thread pool with the configured number of threads.
    ///
    /// Should be called once at startup before any parallel work.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the thread pool was configured
    /// - `Ok(false)` if `max_threads` is None
    /// - `Err` if the global pool has already been initialized
    pub fn install_global_thread_pool(&self) -> Result<bool, rayon::ThreadPoolBuildError> {
        if let Some(num_threads) = self.max_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
