//! Domain models for render requests
//!
//! A [`RenderRequest`] only exists once its parameters have passed validation
//! (see [`crate::utils::validation`]); everything downstream of the validator
//! can rely on its invariants.

pub mod fingerprint;
pub mod render_request;

pub use fingerprint::Fingerprint;
pub use render_request::{RenderRequest, Resolution};
