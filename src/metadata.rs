use crate::accessor::{AccessError, SliceAccessor};
use crate::enums::Gender;

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use std::fmt;

/// Patient identity taken from the baseline slice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    pub birth_date: String,
    pub gender: Gender,
}

impl PatientRecord {
    pub fn read(accessor: &impl SliceAccessor) -> Result<Self, AccessError> {
        Ok(Self {
            id: optional_string(accessor, tags::PATIENT_ID)?,
            name: optional_string(accessor, tags::PATIENT_NAME)?,
            birth_date: optional_string(accessor, tags::PATIENT_BIRTH_DATE)?,
            gender: Gender::from_code(&optional_string(accessor, tags::PATIENT_SEX)?),
        })
    }
}

impl fmt::Display for PatientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Patient(id = {}, name = {}, birth date = {}, gender = {})",
            self.id, self.name, self.birth_date, self.gender
        )
    }
}

/// Acquisition parameters every slice of a volume has to share.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScanMetadata {
    pub rows: u32,
    pub cols: u32,
    pub pixel_spacing_v: f32,
    pub pixel_spacing_h: f32,
    pub rescale_intercept: f32,
    pub rescale_slope: f32,
}

impl ScanMetadata {
    pub fn read(accessor: &impl SliceAccessor) -> Result<Self, AccessError> {
        let rows = accessor.read_u16(tags::ROWS)?;
        let cols = accessor.read_u16(tags::COLUMNS)?;
        let spacing = accessor.read_string(tags::PIXEL_SPACING)?;
        let (pixel_spacing_h, pixel_spacing_v) = parse_pixel_spacing(&spacing)?;

        Ok(Self {
            rows: u32::from(rows),
            cols: u32::from(cols),
            pixel_spacing_v,
            pixel_spacing_h,
            rescale_intercept: optional_f64(accessor, tags::RESCALE_INTERCEPT, 0.0)? as f32,
            rescale_slope: optional_f64(accessor, tags::RESCALE_SLOPE, 1.0)? as f32,
        })
    }

    /// Number of samples in one slice.
    pub fn grid_size(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Map a stored sample value to the physical unit (e.g. Hounsfield).
    pub fn rescale(&self, raw: u16) -> f32 {
        f32::from(raw).mul_add(self.rescale_slope, self.rescale_intercept)
    }
}

impl fmt::Display for ScanMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanMeta(res = ({}, {}), pixelSpace = ({}, {}))",
            self.rows, self.cols, self.pixel_spacing_h, self.pixel_spacing_v
        )
    }
}

/// Split a `h\v` pixel spacing string. The first component is horizontal.
pub(crate) fn parse_pixel_spacing(value: &str) -> Result<(f32, f32), AccessError> {
    let invalid = || AccessError::invalid(tags::PIXEL_SPACING, format!("malformed value {value:?}"));

    let (horizontal, vertical) = value.split_once('\\').ok_or_else(invalid)?;
    let horizontal = horizontal.trim().parse::<f32>().map_err(|_| invalid())?;
    let vertical = vertical.trim().parse::<f32>().map_err(|_| invalid())?;
    Ok((horizontal, vertical))
}

fn optional_string(accessor: &impl SliceAccessor, key: Tag) -> Result<String, AccessError> {
    match accessor.read_string(key) {
        Err(AccessError::MissingField(_)) => Ok(String::new()),
        other => other,
    }
}

// Rescale is optional for modalities that store physical values directly.
fn optional_f64(accessor: &impl SliceAccessor, key: Tag, default: f64) -> Result<f64, AccessError> {
    match accessor.read_f64(key) {
        Err(AccessError::MissingField(_)) => Ok(default),
        other => other,
    }
}
