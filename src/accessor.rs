//! Typed field lookups against a single slice file.
//!
//! The loader never touches DICOM bytes directly. It asks a [`SliceAccessor`]
//! for fields by their [`Tag`] and gets back plain values. [`DicomOpener`] is
//! the production implementation on top of `dicom-rs`. [`InMemoryOpener`]
//! serves slices that are already held in memory.

use dicom::core::Tag;
use dicom::object::{DefaultDicomObject, open_file};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use dicom_dictionary_std::tags;
use ndarray::s;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("cannot open slice file: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("missing field {0}")]
    MissingField(Tag),

    #[error("field {field} could not be read: {reason}")]
    InvalidField { field: Tag, reason: String },
}

impl AccessError {
    pub fn invalid(field: Tag, reason: impl ToString) -> Self {
        AccessError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Read access to the fields of one opened slice file.
pub trait SliceAccessor {
    fn read_string(&self, key: Tag) -> Result<String, AccessError>;

    fn read_u16(&self, key: Tag) -> Result<u16, AccessError>;

    fn read_f64(&self, key: Tag) -> Result<f64, AccessError>;

    fn read_u16_array(&self, key: Tag) -> Result<Vec<u16>, AccessError>;
}

/// Opens slice files into accessors. Shared by every ingestion worker.
pub trait SliceOpener: Sync {
    type Accessor: SliceAccessor;

    fn open(&self, path: &Path) -> Result<Self::Accessor, AccessError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DicomOpener;

impl SliceOpener for DicomOpener {
    type Accessor = DicomSliceAccessor;

    fn open(&self, path: &Path) -> Result<Self::Accessor, AccessError> {
        let object = open_file(path).map_err(|source| AccessError::Open {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        Ok(DicomSliceAccessor { object })
    }
}

pub struct DicomSliceAccessor {
    object: DefaultDicomObject,
}

impl DicomSliceAccessor {
    pub fn new(object: DefaultDicomObject) -> Self {
        Self { object }
    }

    fn element(&self, key: Tag) -> Result<&dicom::object::mem::InMemElement, AccessError> {
        self.object
            .element(key)
            .map_err(|_| AccessError::MissingField(key))
    }

    fn is_signed(&self) -> Result<bool, AccessError> {
        match self.object.element_opt(tags::PIXEL_REPRESENTATION) {
            Ok(Some(element)) => element
                .to_int::<u16>()
                .map(|representation| representation == 1)
                .map_err(|e| AccessError::invalid(tags::PIXEL_REPRESENTATION, e)),
            _ => Ok(false),
        }
    }

    /// Stored values of the first frame, without modality or VOI LUT.
    ///
    /// Signed samples keep their 16-bit pattern, so `-1` comes back as
    /// `0xFFFF`.
    fn decode_samples(&self) -> Result<Vec<u16>, AccessError> {
        let pixel_data = self
            .object
            .decode_pixel_data()
            .map_err(|e| AccessError::invalid(tags::PIXEL_DATA, e))?;
        let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);

        if self.is_signed()? {
            let frames = pixel_data
                .to_ndarray_with_options::<i16>(&options)
                .map_err(|e| AccessError::invalid(tags::PIXEL_DATA, e))?;
            return Ok(frames.slice(s![0, .., .., 0]).iter().map(|&v| v as u16).collect());
        }

        let frames = pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .map_err(|e| AccessError::invalid(tags::PIXEL_DATA, e))?;
        Ok(frames.slice(s![0, .., .., 0]).iter().copied().collect())
    }
}

impl SliceAccessor for DicomSliceAccessor {
    fn read_string(&self, key: Tag) -> Result<String, AccessError> {
        let value = self
            .element(key)?
            .to_str()
            .map_err(|e| AccessError::invalid(key, e))?;
        Ok(value.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
    }

    fn read_u16(&self, key: Tag) -> Result<u16, AccessError> {
        self.element(key)?
            .to_int::<u16>()
            .map_err(|e| AccessError::invalid(key, e))
    }

    fn read_f64(&self, key: Tag) -> Result<f64, AccessError> {
        self.element(key)?
            .to_float64()
            .map_err(|e| AccessError::invalid(key, e))
    }

    fn read_u16_array(&self, key: Tag) -> Result<Vec<u16>, AccessError> {
        if key == tags::PIXEL_DATA {
            return self.decode_samples();
        }
        self.element(key)?
            .to_multi_int::<u16>()
            .map_err(|e| AccessError::invalid(key, e))
    }
}

/// A field value held by an [`InMemorySlice`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    U16(u16),
    F64(f64),
    U16Array(Vec<u16>),
}

/// Slice fields kept in memory, e.g. for data that did not come from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemorySlice {
    fields: HashMap<Tag, FieldValue>,
}

impl InMemorySlice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: Tag, value: FieldValue) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn with_text(self, key: Tag, value: impl Into<String>) -> Self {
        self.with_field(key, FieldValue::Text(value.into()))
    }

    pub fn with_u16(self, key: Tag, value: u16) -> Self {
        self.with_field(key, FieldValue::U16(value))
    }

    pub fn with_f64(self, key: Tag, value: f64) -> Self {
        self.with_field(key, FieldValue::F64(value))
    }

    pub fn with_u16_array(self, key: Tag, value: Vec<u16>) -> Self {
        self.with_field(key, FieldValue::U16Array(value))
    }

    pub fn without(mut self, key: Tag) -> Self {
        self.fields.remove(&key);
        self
    }

    fn field(&self, key: Tag) -> Result<&FieldValue, AccessError> {
        self.fields.get(&key).ok_or(AccessError::MissingField(key))
    }
}

impl SliceAccessor for InMemorySlice {
    fn read_string(&self, key: Tag) -> Result<String, AccessError> {
        match self.field(key)? {
            FieldValue::Text(value) => Ok(value.clone()),
            other => Err(AccessError::invalid(key, format!("expected text, found {other:?}"))),
        }
    }

    fn read_u16(&self, key: Tag) -> Result<u16, AccessError> {
        match self.field(key)? {
            FieldValue::U16(value) => Ok(*value),
            other => Err(AccessError::invalid(key, format!("expected u16, found {other:?}"))),
        }
    }

    fn read_f64(&self, key: Tag) -> Result<f64, AccessError> {
        match self.field(key)? {
            FieldValue::F64(value) => Ok(*value),
            other => Err(AccessError::invalid(key, format!("expected f64, found {other:?}"))),
        }
    }

    fn read_u16_array(&self, key: Tag) -> Result<Vec<u16>, AccessError> {
        match self.field(key)? {
            FieldValue::U16Array(value) => Ok(value.clone()),
            other => Err(AccessError::invalid(key, format!("expected u16 array, found {other:?}"))),
        }
    }
}

/// Serves [`InMemorySlice`]s by file name, ignoring the parent directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOpener {
    slices: HashMap<OsString, InMemorySlice>,
}

impl InMemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_name: impl Into<OsString>, slice: InMemorySlice) {
        self.slices.insert(file_name.into(), slice);
    }

    pub fn with_slice(mut self, file_name: impl Into<OsString>, slice: InMemorySlice) -> Self {
        self.insert(file_name, slice);
        self
    }
}

impl SliceOpener for InMemoryOpener {
    type Accessor = InMemorySlice;

    fn open(&self, path: &Path) -> Result<Self::Accessor, AccessError> {
        path.file_name()
            .and_then(|name| self.slices.get(name))
            .cloned()
            .ok_or_else(|| AccessError::Open {
                path: path.to_path_buf(),
                source: Box::new(io::Error::from(io::ErrorKind::NotFound)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_ct_file;

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.dcm");
        match DicomOpener.open(&path) {
            Err(AccessError::Open { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opening a missing file should fail"),
        }
    }

    #[test]
    fn garbage_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.dcm");
        std::fs::write(&path, b"definitely not a dicom file").unwrap();
        assert!(matches!(
            DicomOpener.open(&path),
            Err(AccessError::Open { .. })
        ));
    }

    #[test]
    fn reads_fields_of_a_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.dcm");
        write_ct_file(&path, -12.5, [0, 10, 200, 4095], false);

        let accessor = DicomOpener.open(&path).unwrap();
        assert_eq!(accessor.read_string(tags::PATIENT_ID).unwrap(), "PAT-001");
        assert_eq!(accessor.read_string(tags::PIXEL_SPACING).unwrap(), "0.5\\0.75");
        assert_eq!(accessor.read_u16(tags::ROWS).unwrap(), 2);
        assert_eq!(accessor.read_f64(tags::SLICE_LOCATION).unwrap(), -12.5);
        assert_eq!(
            accessor.read_u16_array(tags::PIXEL_DATA).unwrap(),
            vec![0, 10, 200, 4095]
        );
    }

    #[test]
    fn signed_samples_keep_their_bit_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signed.dcm");
        let stored = [-1024_i16, -1, 0, 3071].map(|v| v as u16);
        write_ct_file(&path, 0.0, stored, true);

        let accessor = DicomOpener.open(&path).unwrap();
        assert_eq!(accessor.read_u16_array(tags::PIXEL_DATA).unwrap(), stored.to_vec());
    }

    #[test]
    fn in_memory_fields_are_typed() {
        let slice = InMemorySlice::new()
            .with_text(tags::PATIENT_ID, "P-1")
            .with_u16(tags::ROWS, 512)
            .with_f64(tags::SLICE_LOCATION, -12.5)
            .with_u16_array(tags::PIXEL_DATA, vec![1, 2, 3]);

        assert_eq!(slice.read_string(tags::PATIENT_ID).unwrap(), "P-1");
        assert_eq!(slice.read_u16(tags::ROWS).unwrap(), 512);
        assert_eq!(slice.read_f64(tags::SLICE_LOCATION).unwrap(), -12.5);
        assert_eq!(slice.read_u16_array(tags::PIXEL_DATA).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            slice.read_u16(tags::PATIENT_ID),
            Err(AccessError::InvalidField { .. })
        ));
        assert!(matches!(
            slice.read_f64(tags::SLICE_THICKNESS),
            Err(AccessError::MissingField(tag)) if tag == tags::SLICE_THICKNESS
        ));
    }

    #[test]
    fn in_memory_opener_matches_on_file_name() {
        let opener = InMemoryOpener::new()
            .with_slice("a.dcm", InMemorySlice::new().with_u16(tags::ROWS, 2));
        let accessor = opener.open(Path::new("/somewhere/else/a.dcm")).unwrap();
        assert_eq!(accessor.read_u16(tags::ROWS).unwrap(), 2);
        assert!(matches!(
            opener.open(Path::new("b.dcm")),
            Err(AccessError::Open { .. })
        ));
    }
}
