use crate::{
    accessor::{AccessError, DicomOpener, SliceOpener},
    assembler::{Arrival, VolumeAssembler},
    report::{FileFailure, IngestReporter, IngestionReport, SliceError, TracingReporter},
    scanner::{DEFAULT_EXTENSION, DirectoryScanner},
    slice::Slice,
    slice_loader::{Baseline, SliceLoader},
    verifier::ConsistencyVerifier,
    volume::VolumeDataset,
};

use dicom_dictionary_std::tags;
use rayon::prelude::*;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use thiserror::Error;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("cannot read directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("no slice files found in {}", .0.display())]
    NoSliceFiles(PathBuf),

    #[error("baseline slice {} could not be loaded: {source}", path.display())]
    Baseline {
        path: PathBuf,
        #[source]
        source: AccessError,
    },

    #[error("volume buffer holds {actual} samples, expected {expected}")]
    Assembly { expected: usize, actual: usize },

    #[error("ingestion was cancelled")]
    Cancelled,

    #[error("{} of {} slice files failed to load", report.failed_count(), report.total_files)]
    Incomplete { report: IngestionReport },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Cooperative cancellation, checked before each file is loaded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    extension: String,
    workers: Option<usize>,
    cancellation: Option<CancellationToken>,
    strict: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            workers: None,
            cancellation: None,
            strict: false,
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// File extension of slice files, matched case-insensitively.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Number of worker threads. Defaults to the available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fail the whole load when any slice file is skipped.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn workers(&self) -> Option<usize> {
        self.workers
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// An assembled volume and the account of how it was built.
#[derive(Debug)]
pub struct LoadedVolume {
    pub volume: VolumeDataset,
    pub report: IngestionReport,
}

/// Slices and failures collected by one worker, merged at the join.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    pub(crate) arrivals: Vec<Arrival>,
    pub(crate) failures: Vec<FileFailure>,
    pub(crate) cancelled: bool,
}

impl Batch {
    pub(crate) fn merge(mut self, mut other: Batch) -> Batch {
        self.arrivals.append(&mut other.arrivals);
        self.failures.append(&mut other.failures);
        self.cancelled |= other.cancelled;
        self
    }
}

pub struct VolumeLoader<O = DicomOpener, R = TracingReporter> {
    opener: O,
    reporter: R,
    options: LoaderOptions,
}

impl VolumeLoader {
    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(path: impl AsRef<Path>) -> Result<LoadedVolume, VolumeLoaderError> {
        Self::new(LoaderOptions::default()).load(path)
    }

    pub fn new(options: LoaderOptions) -> Self {
        Self::with_parts(DicomOpener, TracingReporter, options)
    }
}

impl<O: SliceOpener, R: IngestReporter> VolumeLoader<O, R> {
    pub fn with_parts(opener: O, reporter: R, options: LoaderOptions) -> Self {
        Self {
            opener,
            reporter,
            options,
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Scan `folder` and load every slice file in it.
    ///
    /// # Errors
    ///
    /// Returns error if the folder cannot be scanned or holds no slice files,
    /// if the baseline cannot be loaded, or if assembly fails. Files that
    /// fail individually are skipped and listed in the report, unless the
    /// loader is strict.
    pub fn load(&self, folder: impl AsRef<Path>) -> Result<LoadedVolume, VolumeLoaderError> {
        let folder = folder.as_ref();
        let paths = DirectoryScanner::new(&self.options.extension).scan(folder)?;
        if paths.is_empty() {
            return Err(VolumeLoaderError::NoSliceFiles(folder.to_path_buf()));
        }
        self.load_files(&paths)
    }

    /// Load the given files. The first one is the baseline.
    pub fn load_files(&self, paths: &[impl AsRef<Path> + Sync]) -> Result<LoadedVolume, VolumeLoaderError> {
        let started = Instant::now();
        let Some((first, rest)) = paths.split_first() else {
            return Err(VolumeLoaderError::NoSliceFiles(PathBuf::new()));
        };
        if self.options.is_cancelled() {
            return Err(VolumeLoaderError::Cancelled);
        }

        // The baseline is fully loaded before any worker starts.
        let first = first.as_ref();
        let (baseline, first_slice) = self.load_baseline(first)?;
        self.reporter.slice_loaded(first, &first_slice);

        let mut batch = self.load_members(rest, &baseline)?;
        if batch.cancelled {
            return Err(VolumeLoaderError::Cancelled);
        }
        batch.arrivals.push(Arrival::new(0, first_slice));
        batch.failures.sort_by(|a, b| a.path.cmp(&b.path));

        let loaded = batch.arrivals.len();
        let Baseline { patient, metadata } = baseline;
        let volume = VolumeAssembler::assemble(patient, metadata, batch.arrivals)?;

        let report = IngestionReport {
            total_files: paths.len(),
            loaded,
            failures: batch.failures,
            elapsed: started.elapsed(),
        };
        self.reporter.assembled(&volume, &report);

        if self.options.strict && !report.is_complete() {
            return Err(VolumeLoaderError::Incomplete { report });
        }
        Ok(LoadedVolume { volume, report })
    }

    fn load_baseline(&self, path: &Path) -> Result<(Baseline, Slice), VolumeLoaderError> {
        let into_error = |source: AccessError| VolumeLoaderError::Baseline {
            path: path.to_path_buf(),
            source,
        };
        let loaded = SliceLoader::load(&self.opener, path, true).map_err(into_error)?;
        let baseline = loaded
            .baseline
            .ok_or_else(|| into_error(AccessError::invalid(tags::ROWS, "no scan metadata")))?;

        self.reporter
            .baseline_loaded(path, &baseline.patient, &baseline.metadata);
        Ok((baseline, loaded.slice))
    }

    fn load_members(
        &self,
        paths: &[impl AsRef<Path> + Sync],
        baseline: &Baseline,
    ) -> Result<Batch, VolumeLoaderError> {
        let verifier = ConsistencyVerifier::new(&baseline.patient, &baseline.metadata);
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = self.options.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build()?;

        let batch = pool.install(|| {
            paths
                .par_iter()
                .enumerate()
                .fold(Batch::default, |mut batch, (index, path)| {
                    if self.options.is_cancelled() {
                        batch.cancelled = true;
                        return batch;
                    }
                    let path = path.as_ref();
                    match self.load_member(path, &verifier) {
                        Ok(slice) => {
                            self.reporter.slice_loaded(path, &slice);
                            // Index 0 is the baseline.
                            batch.arrivals.push(Arrival::new(index + 1, slice));
                        }
                        Err(error) => {
                            let failure = FileFailure::new(path, error);
                            self.reporter.file_failed(&failure);
                            batch.failures.push(failure);
                        }
                    }
                    batch
                })
                .reduce(Batch::default, Batch::merge)
        });
        Ok(batch)
    }

    fn load_member(
        &self,
        path: &Path,
        verifier: &ConsistencyVerifier<'_>,
    ) -> Result<Slice, SliceError> {
        let accessor = self.opener.open(path)?;
        let loaded = SliceLoader::load_from(&accessor, false)?;
        verifier.verify(path, &accessor, &loaded.slice)?;
        Ok(loaded.slice)
    }
}
