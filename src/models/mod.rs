//! Network definitions.
//!
//! The segmentation network is a 2D DynUNet whose kernel and stride schedule
//! is derived from the training spacing and patch size. The weights live in
//! an ONNX export; this module binds the derived schedule to that export and
//! checks that the two agree.

pub mod dynunet;

pub use dynunet::{DynUnet, DynUnetTopology};
