//! Utility modules

pub mod human_format;
pub mod validation;

pub use validation::{RawRenderParams, validate_render_params};
