use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasExtendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Texture `{id}`: {channel} lists {found} sides but diffuse lists {expected}")]
    SideCountMismatch {
        id: String,
        channel: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Invalid asset `{reference}`: {reason}")]
    InvalidAsset { reference: String, reason: String },
    #[error("Target `{target}` would need {required} slots, maximum is {max}")]
    CapacityOverflow {
        target: String,
        required: usize,
        max: usize,
    },
    #[error("Slot {index} is out of range for `{target}` (capacity {capacity})")]
    IndexOutOfRange {
        target: String,
        index: usize,
        capacity: usize,
    },
    #[error("Source provides {available} resolution levels, {required} required")]
    LevelMismatch { required: usize, available: usize },
    #[error("Image is {}x{}, expected {}x{}", found.0, found.1, expected.0, expected.1)]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("Unknown target `{0}`")]
    UnknownTarget(String),
    #[error("Sprite canvas out of space: placed {placed} of {total}")]
    OutOfSpace { placed: usize, total: usize },
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl AtlasExtendError {
    /// True for errors caused by the configuration batch itself. These abort a
    /// load and are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::SideCountMismatch { .. }
                | Self::InvalidAsset { .. }
                | Self::UnknownTarget(_)
                | Self::IndexOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AtlasExtendError>;
