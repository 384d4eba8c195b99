use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    /// Map the single-character DICOM PatientSex code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "M" => Gender::Male,
            "F" => Gender::Female,
            _ => Gender::Other,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Container formats a slice can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    OpenExr,
}

impl ImageFormat {
    /// Pick the format from the file extension, if it is one we can write.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .filter(|ext| ext.eq_ignore_ascii_case("exr"))
            .map(|_| ImageFormat::OpenExr)
    }
}
