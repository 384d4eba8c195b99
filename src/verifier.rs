use crate::{
    accessor::{AccessError, SliceAccessor},
    metadata::{PatientRecord, ScanMetadata},
    slice::Slice,
};

use dicom_dictionary_std::tags;
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// One way a slice differs from the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Divergence {
    PatientId { expected: String, found: String },
    Dimensions { expected: (u32, u32), found: (u32, u32) },
    PixelSpacing { expected: (f32, f32), found: (f32, f32) },
    Rescale { expected: (f32, f32), found: (f32, f32) },
    SampleCount { expected: usize, found: usize },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::PatientId { expected, found } => {
                write!(f, "patient id {found:?} (expected {expected:?})")
            }
            Divergence::Dimensions { expected, found } => write!(
                f,
                "grid {}x{} (expected {}x{})",
                found.0, found.1, expected.0, expected.1
            ),
            Divergence::PixelSpacing { expected, found } => {
                write!(f, "pixel spacing {found:?} (expected {expected:?})")
            }
            Divergence::Rescale { expected, found } => {
                write!(f, "rescale intercept/slope {found:?} (expected {expected:?})")
            }
            Divergence::SampleCount { expected, found } => {
                write!(f, "{found} samples (expected {expected})")
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("diverges from the baseline: {}", list(divergences))]
pub struct ConsistencyError {
    pub path: PathBuf,
    pub divergences: Vec<Divergence>,
}

fn list(divergences: &[Divergence]) -> String {
    divergences
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// Checks member slices against the records seeded from the baseline.
pub struct ConsistencyVerifier<'a> {
    patient: &'a PatientRecord,
    metadata: &'a ScanMetadata,
}

impl<'a> ConsistencyVerifier<'a> {
    pub fn new(patient: &'a PatientRecord, metadata: &'a ScanMetadata) -> Self {
        Self { patient, metadata }
    }

    /// A slice is consistent only if every checked field matches.
    ///
    /// # Errors
    ///
    /// Returns every divergence found, or an access error if the metadata
    /// itself cannot be read.
    pub fn verify(
        &self,
        path: impl Into<PathBuf>,
        accessor: &impl SliceAccessor,
        slice: &Slice,
    ) -> Result<(), VerifyError> {
        let patient_id = match accessor.read_string(tags::PATIENT_ID) {
            Err(AccessError::MissingField(_)) => String::new(),
            other => other?,
        };
        let metadata = ScanMetadata::read(accessor)?;

        let divergences = self.compare(&patient_id, &metadata, slice);
        if divergences.is_empty() {
            Ok(())
        } else {
            Err(ConsistencyError {
                path: path.into(),
                divergences,
            }
            .into())
        }
    }

    pub fn compare(&self, patient_id: &str, metadata: &ScanMetadata, slice: &Slice) -> Vec<Divergence> {
        let base = self.metadata;
        let mut divergences = Vec::new();

        if patient_id != self.patient.id {
            divergences.push(Divergence::PatientId {
                expected: self.patient.id.clone(),
                found: patient_id.to_string(),
            });
        }
        if (metadata.rows, metadata.cols) != (base.rows, base.cols) {
            divergences.push(Divergence::Dimensions {
                expected: (base.rows, base.cols),
                found: (metadata.rows, metadata.cols),
            });
        }
        if (metadata.pixel_spacing_h, metadata.pixel_spacing_v)
            != (base.pixel_spacing_h, base.pixel_spacing_v)
        {
            divergences.push(Divergence::PixelSpacing {
                expected: (base.pixel_spacing_h, base.pixel_spacing_v),
                found: (metadata.pixel_spacing_h, metadata.pixel_spacing_v),
            });
        }
        if (metadata.rescale_intercept, metadata.rescale_slope)
            != (base.rescale_intercept, base.rescale_slope)
        {
            divergences.push(Divergence::Rescale {
                expected: (base.rescale_intercept, base.rescale_slope),
                found: (metadata.rescale_intercept, metadata.rescale_slope),
            });
        }
        if slice.samples().len() != base.grid_size() {
            divergences.push(Divergence::SampleCount {
                expected: base.grid_size(),
                found: slice.samples().len(),
            });
        }
        divergences
    }
}
