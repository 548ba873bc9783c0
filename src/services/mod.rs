//! Service layer
//!
//! Services orchestrate the domain components (validator, cache, render
//! engine, heavy scheduler) independently of the HTTP transport, so the whole
//! request pipeline can be exercised without a server.

pub mod render_service;

pub use render_service::{CacheStatus, RenderOutcome, RenderService};
