//! Per-file outcomes of an ingestion run and the sink they are reported to.

use crate::{
    accessor::AccessError,
    metadata::{PatientRecord, ScanMetadata},
    slice::Slice,
    verifier::{ConsistencyError, VerifyError},
    volume::VolumeDataset,
};

use std::{path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SliceError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

impl From<VerifyError> for SliceError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Access(err) => SliceError::Access(err),
            VerifyError::Consistency(err) => SliceError::Consistency(err),
        }
    }
}

/// A file that was skipped, and why.
#[derive(Debug, Error)]
#[error("{}: {error}", path.display())]
pub struct FileFailure {
    pub path: PathBuf,
    #[source]
    pub error: SliceError,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, error: impl Into<SliceError>) -> Self {
        Self {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn is_consistency(&self) -> bool {
        matches!(self.error, SliceError::Consistency(_))
    }
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    /// Files found by the scan, baseline included.
    pub total_files: usize,
    /// Slices that made it into the volume.
    pub loaded: usize,
    /// Skipped files, sorted by path.
    pub failures: Vec<FileFailure>,
    pub elapsed: Duration,
}

impl IngestionReport {
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// True when every scanned file ended up in the volume.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.loaded == self.total_files
    }
}

/// Receives ingestion events. Called concurrently from worker threads.
pub trait IngestReporter: Sync {
    fn baseline_loaded(&self, _path: &Path, _patient: &PatientRecord, _metadata: &ScanMetadata) {}

    fn slice_loaded(&self, _path: &Path, _slice: &Slice) {}

    fn file_failed(&self, failure: &FileFailure);

    fn assembled(&self, _volume: &VolumeDataset, _report: &IngestionReport) {}
}

impl<R: IngestReporter + ?Sized> IngestReporter for &R {
    fn baseline_loaded(&self, path: &Path, patient: &PatientRecord, metadata: &ScanMetadata) {
        (**self).baseline_loaded(path, patient, metadata)
    }

    fn slice_loaded(&self, path: &Path, slice: &Slice) {
        (**self).slice_loaded(path, slice)
    }

    fn file_failed(&self, failure: &FileFailure) {
        (**self).file_failed(failure)
    }

    fn assembled(&self, volume: &VolumeDataset, report: &IngestionReport) {
        (**self).assembled(volume, report)
    }
}

/// Default sink, forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl IngestReporter for TracingReporter {
    fn baseline_loaded(&self, path: &Path, patient: &PatientRecord, metadata: &ScanMetadata) {
        tracing::info!(path = %path.display(), "baseline {patient}, {metadata}");
    }

    fn slice_loaded(&self, path: &Path, slice: &Slice) {
        tracing::trace!(
            path = %path.display(),
            location = slice.location(),
            min = slice.min(),
            max = slice.max(),
            "slice loaded"
        );
    }

    fn file_failed(&self, failure: &FileFailure) {
        match &failure.error {
            SliceError::Access(err) => {
                tracing::error!(path = %failure.path.display(), "failed to load slice file: {err}")
            }
            SliceError::Consistency(err) => {
                tracing::warn!(path = %failure.path.display(), "skipping divergent slice: {err}")
            }
        }
    }

    fn assembled(&self, volume: &VolumeDataset, report: &IngestionReport) {
        tracing::info!(
            slices = volume.slice_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Min val: {}, max val: {}",
            volume.min_value(),
            volume.max_value()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::Divergence;

    #[test]
    fn report_completeness() {
        let mut report = IngestionReport {
            total_files: 3,
            loaded: 3,
            ..Default::default()
        };
        assert!(report.is_complete());

        report.loaded = 2;
        report.failures.push(FileFailure::new(
            "b.dcm",
            ConsistencyError {
                path: "b.dcm".into(),
                divergences: vec![Divergence::SampleCount {
                    expected: 16,
                    found: 4,
                }],
            },
        ));
        assert!(!report.is_complete());
        assert_eq!(report.failed_count(), 1);
        assert!(report.failures[0].is_consistency());
    }

    #[test]
    fn failure_message_leads_with_the_path() {
        let failure = FileFailure::new("dir/a.dcm", AccessError::MissingField(dicom_dictionary_std::tags::ROWS));
        assert!(failure.to_string().starts_with("dir/a.dcm: missing field"));
        assert!(!failure.is_consistency());
    }

    #[test]
    fn failure_message_names_the_path_once() {
        let consistency = FileFailure::new(
            "dir/b.dcm",
            ConsistencyError {
                path: "dir/b.dcm".into(),
                divergences: vec![Divergence::SampleCount {
                    expected: 16,
                    found: 12,
                }],
            },
        );
        let open = FileFailure::new(
            "dir/b.dcm",
            AccessError::Open {
                path: "dir/b.dcm".into(),
                source: Box::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
            },
        );

        for failure in [consistency, open] {
            let message = failure.to_string();
            assert_eq!(message.matches("b.dcm").count(), 1, "{message}");
        }
    }
}
