use crate::{
    metadata::{PatientRecord, ScanMetadata},
    slice::Slice,
    volume::VolumeDataset,
    volume_loader::VolumeLoaderError,
};

/// A slice tagged with the position its file had in the scan.
///
/// The index breaks ties between slices at the same location, which keeps the
/// final order independent of which worker finished first.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub order: usize,
    pub slice: Slice,
}

impl Arrival {
    pub fn new(order: usize, slice: Slice) -> Self {
        Self { order, slice }
    }
}

pub struct VolumeAssembler;

impl VolumeAssembler {
    /// Sort slices by location and build the flat sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::Assembly`] if the buffer does not cover
    /// exactly `rows * cols * slices` samples.
    pub fn assemble(
        patient: PatientRecord,
        metadata: ScanMetadata,
        mut arrivals: Vec<Arrival>,
    ) -> Result<VolumeDataset, VolumeLoaderError> {
        Self::sort_arrivals(&mut arrivals);
        let slices: Vec<Slice> = arrivals.into_iter().map(|arrival| arrival.slice).collect();

        let expected = metadata.grid_size() * slices.len();
        let buffer = Self::build_buffer(&slices, expected);
        if buffer.len() != expected {
            return Err(VolumeLoaderError::Assembly {
                expected,
                actual: buffer.len(),
            });
        }

        let (min, max) = Self::extrema(&slices);
        Ok(VolumeDataset::new(patient, metadata, slices, buffer, min, max))
    }

    fn sort_arrivals(arrivals: &mut [Arrival]) {
        arrivals.sort_by(|a, b| {
            a.slice
                .location
                .total_cmp(&b.slice.location)
                .then(a.order.cmp(&b.order))
        });
    }

    fn build_buffer(slices: &[Slice], expected: usize) -> Vec<f32> {
        let mut buffer = Vec::with_capacity(expected);
        for slice in slices {
            buffer.extend(slice.samples.iter().map(|&v| f32::from(v)));
        }
        buffer.shrink_to_fit();
        buffer
    }

    // Reduce over per-slice extrema instead of rescanning the buffer.
    fn extrema(slices: &[Slice]) -> (u16, u16) {
        slices
            .iter()
            .fold((u16::MAX, u16::MIN), |(min, max), slice| {
                (min.min(slice.min), max.max(slice.max))
            })
    }
}
