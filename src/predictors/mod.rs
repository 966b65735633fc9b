//! Inference strategy and output post-processing.
//!
//! - [`SlidingWindowInferer2D`] tiles each slice into network-sized windows
//! - [`flip_averaged_prediction`] averages over in-plane flips
//! - [`Activation`] and [`AsDiscrete`] turn logits into a binary label map

pub mod flip;
pub mod postprocess;
pub mod sliding_window;

pub use flip::{Flip, flip_averaged_prediction};
pub use postprocess::{Activation, AsDiscrete};
pub use sliding_window::SlidingWindowInferer2D;
