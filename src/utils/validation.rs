//! Render parameter validation
//!
//! Turns the four raw query strings of a render request into a
//! [`RenderRequest`], or the first [`ValidationError`] found. Fields are checked
//! in the order `x`, `y`, `zoom`, `res`.
//!
//! # Usage
//!
//! ```rust
//! use mandelbrot_server::utils::validation::{RawRenderParams, validate_render_params};
//!
//! let raw = RawRenderParams::new("0", "0", "1", "small");
//! let request = validate_render_params(&raw).unwrap();
//! assert_eq!(request.pixels(), 64);
//! ```

use serde::Deserialize;

use crate::errors::ValidationError;
use crate::models::render_request::check_coordinate;
use crate::models::{RenderRequest, Resolution};

/// Unvalidated render parameters as they arrive on the query string
///
/// Missing parameters deserialize to empty strings and fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRenderParams {
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
    #[serde(default)]
    pub zoom: String,
    #[serde(default)]
    pub res: String,
}

impl RawRenderParams {
    pub fn new(
        x: impl Into<String>,
        y: impl Into<String>,
        zoom: impl Into<String>,
        res: impl Into<String>,
    ) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            zoom: zoom.into(),
            res: res.into(),
        }
    }
}

/// Validate raw parameters into a canonical render request
pub fn validate_render_params(raw: &RawRenderParams) -> Result<RenderRequest, ValidationError> {
    let x = parse_coordinate("x", &raw.x)?;
    let y = parse_coordinate("y", &raw.y)?;
    let zoom = parse_zoom(&raw.zoom)?;
    let resolution: Resolution = raw.res.parse()?;

    RenderRequest::new(x, y, zoom, resolution)
}

fn parse_coordinate(field: &'static str, value: &str) -> Result<f64, ValidationError> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| ValidationError::InvalidCoordinate { field })?;
    check_coordinate(field, parsed)
}

/// Plain decimal digits only; `u64::from_str` would also take a leading `+`
fn parse_zoom(value: &str) -> Result<u64, ValidationError> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidZoom);
    }
    let zoom: u64 = value.parse().map_err(|_| ValidationError::InvalidZoom)?;
    if zoom < 1 {
        return Err(ValidationError::ZoomTooSmall);
    }
    Ok(zoom)
}
