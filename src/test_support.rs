use crate::accessor::InMemorySlice;

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::{tags, uids};
use std::path::Path;

pub(crate) const ROWS: u16 = 4;
pub(crate) const COLS: u16 = 4;

/// A consistent 4x4 slice filled with `value`.
pub(crate) fn slice_file(location: f64, value: u16) -> InMemorySlice {
    InMemorySlice::new()
        .with_text(tags::PATIENT_ID, "PAT-001")
        .with_text(tags::PATIENT_NAME, "Doe^Jane")
        .with_text(tags::PATIENT_BIRTH_DATE, "19700101")
        .with_text(tags::PATIENT_SEX, "F")
        .with_u16(tags::ROWS, ROWS)
        .with_u16(tags::COLUMNS, COLS)
        .with_text(tags::PIXEL_SPACING, "1.0\\1.0")
        .with_f64(tags::RESCALE_INTERCEPT, 0.0)
        .with_f64(tags::RESCALE_SLOPE, 1.0)
        .with_f64(tags::SLICE_THICKNESS, 1.0)
        .with_f64(tags::SLICE_LOCATION, location)
        .with_u16_array(tags::PIXEL_DATA, vec![value; ROWS as usize * COLS as usize])
}

/// Writes a 2x2 single-frame CT file. `samples` are the stored 16-bit words.
pub(crate) fn write_ct_file(path: &Path, location: f64, samples: [u16; 4], signed: bool) {
    let text = |tag, vr, value: &str| DataElement::new(tag, vr, PrimitiveValue::from(value));
    let short = |tag, value: u16| DataElement::new(tag, VR::US, PrimitiveValue::from(value));

    let object = InMemDicomObject::from_element_iter([
        text(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE),
        text(tags::SOP_INSTANCE_UID, VR::UI, "2.25.1001"),
        text(tags::PATIENT_ID, VR::LO, "PAT-001"),
        text(tags::SLICE_THICKNESS, VR::DS, "1.5"),
        text(tags::SLICE_LOCATION, VR::DS, location.to_string().as_str()),
        short(tags::SAMPLES_PER_PIXEL, 1),
        text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
        short(tags::ROWS, 2),
        short(tags::COLUMNS, 2),
        text(tags::PIXEL_SPACING, VR::DS, "0.5\\0.75"),
        short(tags::BITS_ALLOCATED, 16),
        short(tags::BITS_STORED, 16),
        short(tags::HIGH_BIT, 15),
        short(tags::PIXEL_REPRESENTATION, u16::from(signed)),
        DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(samples.into_iter().collect()),
        ),
    ]);

    object
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid("2.25.1001"),
        )
        .unwrap()
        .write_to_file(path)
        .unwrap();
}
