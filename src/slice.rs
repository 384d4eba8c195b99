/// One 2D sample grid read from a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub(crate) samples: Vec<u16>,
    pub(crate) thickness: f32,
    pub(crate) location: f32,
    pub(crate) min: u16,
    pub(crate) max: u16,
}

impl Slice {
    pub fn new(samples: Vec<u16>, thickness: f32, location: f32) -> Self {
        let (min, max) = samples
            .iter()
            .fold((u16::MAX, u16::MIN), |(min, max), &v| (min.min(v), max.max(v)));
        Self {
            samples,
            thickness,
            location,
            min,
            max,
        }
    }

    /// Raw stored sample values, row-major.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// Position along the stacking axis. May be negative.
    pub fn location(&self) -> f32 {
        self.location
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// Samples mapped to `[0, 1]` using this slice's own extrema.
    ///
    /// A slice with a single distinct value maps to all zeros.
    pub fn normalized(&self) -> Vec<f32> {
        let range = f32::from(self.max) - f32::from(self.min);
        if range <= 0.0 {
            return vec![0.0; self.samples.len()];
        }
        let min = f32::from(self.min);
        self.samples
            .iter()
            .map(|&v| (f32::from(v) - min) / range)
            .collect()
    }
}
