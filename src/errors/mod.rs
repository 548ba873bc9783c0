//! Centralized error handling for the Mandelbrot render service
//!
//! # Error Categories
//!
//! - **Validation Errors**: malformed or out-of-range render parameters (client errors)
//! - **Cache Errors**: disk cache read/write failures, always recovered locally
//! - **Scheduler Errors**: the heavy render worker is unavailable
//! - **Encode Errors**: the bitmap could not be encoded to PNG
//!
//! # Usage
//!
//! ```rust
//! use mandelbrot_server::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Cache Results
pub type CacheResult<T> = Result<T, CacheError>;
