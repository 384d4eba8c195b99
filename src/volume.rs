use crate::enums::ImageFormat;
use crate::export::{ExportError, ImageEncoder, encoder_for};
use crate::metadata::{PatientRecord, ScanMetadata};
use crate::slice::Slice;

use half::f16;
use ndarray::ArrayView2;
use ndarray::ArrayView3;
use rayon::prelude::*;
use std::path::Path;

/// Slices of one scan, ordered by location, plus the flattened sample buffer.
///
/// Built once by the assembler and read-only afterwards.
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    patient: PatientRecord,
    metadata: ScanMetadata,
    slices: Vec<Slice>,
    buffer: Vec<f32>,
    min: u16,
    max: u16,
}

impl VolumeDataset {
    pub(crate) fn new(
        patient: PatientRecord,
        metadata: ScanMetadata,
        slices: Vec<Slice>,
        buffer: Vec<f32>,
        min: u16,
        max: u16,
    ) -> Self {
        Self {
            patient,
            metadata,
            slices,
            buffer,
            min,
            max,
        }
    }

    pub fn patient(&self) -> &PatientRecord {
        &self.patient
    }

    pub fn scan_metadata(&self) -> &ScanMetadata {
        &self.metadata
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn row_width(&self) -> usize {
        self.metadata.rows as usize
    }

    pub fn col_width(&self) -> usize {
        self.metadata.cols as usize
    }

    /// Total number of samples, `rows * cols * slices`.
    pub fn volume_size(&self) -> usize {
        self.row_width() * self.col_width() * self.slice_count()
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.slice_count(), self.row_width(), self.col_width())
    }

    /// Physical sample spacing (horizontal, vertical, slice thickness).
    pub fn spacing(&self) -> (f32, f32, f32) {
        let thickness = self.slices.first().map_or(0.0, Slice::thickness);
        (
            self.metadata.pixel_spacing_h,
            self.metadata.pixel_spacing_v,
            thickness,
        )
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn slice(&self, index: usize) -> Option<&Slice> {
        self.slices.get(index)
    }

    /// Raw sample values widened to `f32`, slice after slice.
    pub fn buffer_data(&self) -> &[f32] {
        &self.buffer
    }

    /// The buffer as bytes, ready for a texture upload.
    pub fn buffer_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffer)
    }

    /// Half precision copy of the buffer for `R16Float` style textures.
    pub fn buffer_f16(&self) -> Vec<f16> {
        self.buffer.par_iter().map(|&v| f16::from_f32(v)).collect()
    }

    /// The buffer as a (depth, height, width) array.
    pub fn view(&self) -> Option<ArrayView3<'_, f32>> {
        ArrayView3::from_shape(self.dim(), &self.buffer).ok()
    }

    /// Raw samples of one slice as a (height, width) array.
    pub fn slice_view(&self, index: usize) -> Option<ArrayView2<'_, u16>> {
        let slice = self.slices.get(index)?;
        ArrayView2::from_shape((self.row_width(), self.col_width()), slice.samples()).ok()
    }

    /// Smallest raw sample value in the volume.
    pub fn min_value(&self) -> u16 {
        self.min
    }

    /// Largest raw sample value in the volume.
    pub fn max_value(&self) -> u16 {
        self.max
    }

    /// Save one slice, normalized to `[0, 1]` by its own extrema.
    ///
    /// The container is picked from the file extension; only `.exr` is
    /// supported.
    pub fn export_slice(&self, path: impl AsRef<Path>, index: usize) -> Result<(), ExportError> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path)
            .ok_or_else(|| ExportError::UnsupportedFormat(path.to_path_buf()))?;
        self.export_slice_with(encoder_for(format).as_ref(), path, index)
    }

    pub fn export_slice_with(
        &self,
        encoder: &dyn ImageEncoder,
        path: impl AsRef<Path>,
        index: usize,
    ) -> Result<(), ExportError> {
        let slice = self.slices.get(index).ok_or(ExportError::IndexOutOfRange {
            index,
            count: self.slice_count(),
        })?;
        encoder.encode(
            path.as_ref(),
            self.metadata.cols,
            self.metadata.rows,
            &slice.normalized(),
        )
    }
}
