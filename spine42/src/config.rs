/// Options for [`crate::SkeletonBinary`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderConfig {
    /// Multiplier applied to every spatial value (positions, lengths, vertex coordinates).
    pub scale: f32,
    /// When set, an attachment whose texture region cannot be resolved is dropped with a
    /// warning instead of failing the whole load.
    pub skip_missing_regions: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            skip_missing_regions: false,
        }
    }
}

impl LoaderConfig {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_skip_missing_regions(mut self, skip: bool) -> Self {
        self.skip_missing_regions = skip;
        self
    }
}
