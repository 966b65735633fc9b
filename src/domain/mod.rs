//! Domain types for segmentation cases.
//!
//! A case starts as a [`CaseDescriptor`] (just a path), gains image data and
//! [`CaseMetadata`] while flowing through the preprocessing chain as
//! [`CaseData`], and ends as a [`Prediction`] handed to the saver.

pub mod case;

pub use case::{CaseData, CaseDescriptor, CaseMetadata, Prediction, nifti_stem};
