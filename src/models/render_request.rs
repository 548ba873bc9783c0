use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Inclusive bound on the absolute value of either coordinate
pub const COORDINATE_LIMIT: f64 = 2.0;

/// Output size tiers, in pixels per side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Small,
    Medium,
    Big,
    Ultra,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [Self::Small, Self::Medium, Self::Big, Self::Ultra];

    /// Width and height of the rendered bitmap
    pub const fn pixels(self) -> u32 {
        match self {
            Self::Small => 64,
            Self::Medium => 512,
            Self::Big => 2048,
            Self::Ultra => 4096,
        }
    }

    /// Heavy tiers are rendered by the serialized background worker
    pub const fn is_heavy(self) -> bool {
        matches!(self, Self::Big | Self::Ultra)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Big => "big",
            Self::Ultra => "ultra",
        }
    }
}

impl FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|res| res.as_str() == s)
            .ok_or(ValidationError::UnknownResolution)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request for one Mandelbrot bitmap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    x: f64,
    y: f64,
    zoom: u64,
    resolution: Resolution,
}

impl RenderRequest {
    /// Build a request from already-typed values, applying the same bounds
    /// checks as the string validator.
    pub fn new(x: f64, y: f64, zoom: u64, resolution: Resolution) -> Result<Self, ValidationError> {
        let x = check_coordinate("x", x)?;
        let y = check_coordinate("y", y)?;
        if zoom < 1 {
            return Err(ValidationError::ZoomTooSmall);
        }
        Ok(Self {
            x,
            y,
            zoom,
            resolution,
        })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn zoom(&self) -> u64 {
        self.zoom
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pixels(&self) -> u32 {
        self.resolution.pixels()
    }

    pub fn is_heavy(&self) -> bool {
        self.resolution.is_heavy()
    }
}

/// Range-check a coordinate and fold `-0.0` into `0.0`
pub(crate) fn check_coordinate(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidCoordinate { field });
    }
    if !(-COORDINATE_LIMIT..=COORDINATE_LIMIT).contains(&value) {
        return Err(ValidationError::OutOfRange { field });
    }
    // -0.0 + 0.0 == +0.0
    Ok(value + 0.0)
}
