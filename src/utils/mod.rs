//! Utility functions for the segmentation pipeline.
//!
//! NIfTI reading and writing, and logging setup.

pub mod nifti;

pub use nifti::{NiftiVolume, voxel_sizes};

/// Initializes the tracing subscriber for logging.
///
/// Uses `RUST_LOG` for filtering and falls back to `info` when it is unset.
/// Calling it twice is harmless; the second subscriber is ignored.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
