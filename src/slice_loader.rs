use crate::{
    accessor::{AccessError, SliceAccessor, SliceOpener},
    metadata::{PatientRecord, ScanMetadata},
    slice::Slice,
};

use dicom_dictionary_std::tags;
use std::path::Path;

/// Records seeded from the baseline file.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub patient: PatientRecord,
    pub metadata: ScanMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSlice {
    pub slice: Slice,
    /// Present only when loaded as the baseline.
    pub baseline: Option<Baseline>,
}

pub struct SliceLoader;

impl SliceLoader {
    /// Open `path` and load it as a slice.
    pub fn load<O: SliceOpener>(
        opener: &O,
        path: &Path,
        baseline: bool,
    ) -> Result<LoadedSlice, AccessError> {
        let accessor = opener.open(path)?;
        Self::load_from(&accessor, baseline)
    }

    /// Load a slice from an already opened file.
    ///
    /// # Errors
    ///
    /// Returns error if a required field is missing or malformed, or, for the
    /// baseline, if the pixel data does not cover the declared grid.
    pub fn load_from(
        accessor: &impl SliceAccessor,
        baseline: bool,
    ) -> Result<LoadedSlice, AccessError> {
        let slice = Self::read_slice(accessor)?;

        let baseline = if baseline {
            let metadata = ScanMetadata::read(accessor)?;
            Self::validate_grid(&metadata, &slice)?;
            Some(Baseline {
                patient: PatientRecord::read(accessor)?,
                metadata,
            })
        } else {
            None
        };

        Ok(LoadedSlice { slice, baseline })
    }

    fn read_slice(accessor: &impl SliceAccessor) -> Result<Slice, AccessError> {
        let samples = accessor.read_u16_array(tags::PIXEL_DATA)?;
        let thickness = accessor.read_f64(tags::SLICE_THICKNESS)? as f32;
        let location = accessor.read_f64(tags::SLICE_LOCATION)? as f32;
        Ok(Slice::new(samples, thickness, location))
    }

    // Every member is checked against the baseline grid, so the baseline
    // itself has to be sound.
    fn validate_grid(metadata: &ScanMetadata, slice: &Slice) -> Result<(), AccessError> {
        let expected = metadata.grid_size();
        if expected == 0 {
            return Err(AccessError::invalid(tags::ROWS, "empty image grid"));
        }
        if slice.samples().len() != expected {
            return Err(AccessError::invalid(
                tags::PIXEL_DATA,
                format!(
                    "expected {expected} samples for a {}x{} grid, found {}",
                    metadata.rows,
                    metadata.cols,
                    slice.samples().len()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accessor::InMemoryOpener, enums::Gender, test_support::slice_file};

    #[test]
    fn baseline_seeds_patient_and_metadata() {
        let file = slice_file(5.0, 10).with_text(tags::PIXEL_SPACING, "0.5\\0.8");
        let loaded = SliceLoader::load_from(&file, true).unwrap();

        let baseline = loaded.baseline.expect("baseline records");
        assert_eq!(baseline.patient.id, "PAT-001");
        assert_eq!(baseline.patient.gender, Gender::Female);
        assert_eq!(baseline.metadata.rows, 4);
        assert_eq!(baseline.metadata.cols, 4);
        assert_eq!(baseline.metadata.pixel_spacing_h, 0.5);
        assert_eq!(baseline.metadata.pixel_spacing_v, 0.8);
        assert_eq!(loaded.slice.location(), 5.0);
        assert_eq!(loaded.slice.min(), 10);
        assert_eq!(loaded.slice.max(), 10);
    }

    #[test]
    fn member_has_no_baseline_records() {
        let loaded = SliceLoader::load_from(&slice_file(-3.0, 20), false).unwrap();
        assert!(loaded.baseline.is_none());
        assert_eq!(loaded.slice.samples().len(), 16);
    }

    #[test]
    fn missing_location_is_an_access_error() {
        let file = slice_file(0.0, 1).without(tags::SLICE_LOCATION);
        assert!(matches!(
            SliceLoader::load_from(&file, false),
            Err(AccessError::MissingField(tag)) if tag == tags::SLICE_LOCATION
        ));
    }

    #[test]
    fn baseline_with_short_pixel_data_is_rejected() {
        let file = slice_file(0.0, 1).with_u16_array(tags::PIXEL_DATA, vec![1; 15]);
        assert!(matches!(
            SliceLoader::load_from(&file, true),
            Err(AccessError::InvalidField { field, .. }) if field == tags::PIXEL_DATA
        ));
    }

    #[test]
    fn load_goes_through_the_opener() {
        let opener = InMemoryOpener::new().with_slice("a.dcm", slice_file(1.0, 3));
        let loaded = SliceLoader::load(&opener, Path::new("a.dcm"), false).unwrap();
        assert_eq!(loaded.slice.location(), 1.0);
        assert!(matches!(
            SliceLoader::load(&opener, Path::new("b.dcm"), false),
            Err(AccessError::Open { .. })
        ));
    }
}
