//! # DICOM-volume library
//!
//! This crate assembles a folder of single-slice DICOM files into one
//! verified, spatially ordered volume.
//!
//! The first file found is the baseline: its patient and scan metadata seed
//! the checks every other slice has to pass. The remaining files are loaded
//! in parallel using rayon. Slices whose metadata diverges from the baseline,
//! or that cannot be read at all, are skipped and listed in an
//! [`IngestionReport`] instead of silently ending up in the volume.
//!
//! Once every file is processed the slices are sorted by their Slice
//! Location and concatenated into a flat `f32` buffer that rendering or
//! analysis code can consume directly. The final order only depends on the
//! slice locations, never on which worker finished first.
//!
//! DICOM files are assumed to have the following attributes:
//!  - Axial data set with a Slice Location on every file
//!  - No multiframe (always the first frame is used)
//!  - Images from the same patient with identical Rows, Columns, Pixel
//!    Spacing and Rescale Slope/Intercept
//!
//! # Examples
//!
//! ## Reading multiple DICOM files into a volume
//!
//! To read all DICOM files from the dicom/ directory and save the center
//! slice as an OpenEXR image:
//!
//! ```no_run
//! # use dicom_volume::load_volume_dataset;
//! let loaded = load_volume_dataset("dicom").expect("should have loaded files from directory");
//! for failure in &loaded.report.failures {
//!     eprintln!("skipped {failure}");
//! }
//! let volume = loaded.volume;
//! volume
//!     .export_slice("center.exr", volume.slice_count() / 2)
//!     .expect("should have written the center slice");
//! ```
//!
//! ## Tuning the loader
//!
//! ```no_run
//! # use dicom_volume::{CancellationToken, DicomOpener, LoaderOptions, TracingReporter, VolumeLoader};
//! let token = CancellationToken::new();
//! let options = LoaderOptions::new()
//!     .with_workers(4)
//!     .with_cancellation(token.clone())
//!     .with_strict(true);
//! let loaded = VolumeLoader::with_parts(DicomOpener, TracingReporter, options).load("dicom");
//! ```

pub mod accessor;
pub mod assembler;
pub mod enums;
pub mod export;
pub mod metadata;
pub mod report;
pub mod scanner;
pub mod slice;
pub mod slice_loader;
pub mod verifier;
pub mod volume;
pub mod volume_loader;

#[cfg(test)]
mod test_support;

pub use accessor::{AccessError, DicomOpener, InMemoryOpener, InMemorySlice, SliceAccessor, SliceOpener};
pub use enums::{Gender, ImageFormat};
pub use export::{ExportError, ExrEncoder, ImageEncoder};
pub use metadata::{PatientRecord, ScanMetadata};
pub use report::{FileFailure, IngestReporter, IngestionReport, SliceError, TracingReporter};
pub use slice::Slice;
pub use verifier::{ConsistencyError, Divergence};
pub use volume::VolumeDataset;
pub use volume_loader::{CancellationToken, LoadedVolume, LoaderOptions, VolumeLoader, VolumeLoaderError};

use std::path::Path;

/// Load every `.dcm` file in `folder` into a volume.
///
/// Shorthand for [`VolumeLoader::load_from_directory`].
pub fn load_volume_dataset(folder: impl AsRef<Path>) -> Result<LoadedVolume, VolumeLoaderError> {
    VolumeLoader::load_from_directory(folder)
}
