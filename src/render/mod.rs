//! Mandelbrot render engine
//!
//! Escape-time classification of every pixel in a square viewport centred on
//! the request coordinates. Rendering is pure and deterministic: identical
//! requests always produce identical bitmaps, which the disk cache relies on.

pub mod encode;

use image::{GrayImage, Luma};
use tracing::debug;

use crate::config::defaults::DEFAULT_MAX_ITERATIONS;
use crate::models::RenderRequest;

pub use encode::{PNG_CONTENT_TYPE, encode_png};

/// Grayscale output bitmap, `pixels x pixels`
pub type Bitmap = GrayImage;

/// Tone of points that stay bounded for the whole iteration budget
pub const MEMBER_TONE: Luma<u8> = Luma([255]);
/// Tone of points that escape
pub const ESCAPED_TONE: Luma<u8> = Luma([0]);

/// Anything that can turn a validated request into a bitmap
///
/// Implementations must be deterministic and infallible.
pub trait RenderEngine: Send + Sync + 'static {
    fn render(&self, request: &RenderRequest) -> Bitmap;
}

/// The escape-time renderer
#[derive(Debug, Clone, Copy)]
pub struct EscapeTimeEngine {
    max_iterations: u32,
}

impl Default for EscapeTimeEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl EscapeTimeEngine {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }
}

impl RenderEngine for EscapeTimeEngine {
    fn render(&self, request: &RenderRequest) -> Bitmap {
        let pixels = request.pixels();
        let budget = iteration_budget(pixels, request.zoom(), self.max_iterations);
        debug!(
            x = request.x(),
            y = request.y(),
            zoom = request.zoom(),
            pixels,
            iterations = budget,
            "Rendering viewport"
        );

        let viewport = Viewport::new(request);
        GrayImage::from_fn(pixels, pixels, |px, py| {
            let (re, im) = viewport.point(px, py);
            if escapes(re, im, budget) {
                ESCAPED_TONE
            } else {
                MEMBER_TONE
            }
        })
    }
}

/// Iterations spent per pixel: grows logarithmically with the effective
/// magnification `pixels * zoom`, capped at `max_iterations`.
pub fn iteration_budget(pixels: u32, zoom: u64, max_iterations: u32) -> u32 {
    let magnitude = (f64::from(pixels) * zoom as f64 / 4.0).log10();
    if magnitude.is_nan() || magnitude <= 0.0 {
        return 0;
    }
    let optimal = 5.0 * magnitude.powf(1.25);
    // `as` truncates toward zero, matching floor for positive values
    optimal.min(f64::from(max_iterations)) as u32
}

/// Mapping from pixel coordinates to points of the complex plane
#[derive(Debug, Clone, Copy)]
struct Viewport {
    left: f64,
    top: f64,
    step: f64,
}

impl Viewport {
    fn new(request: &RenderRequest) -> Self {
        let delta = 2.0 / request.zoom() as f64;
        Self {
            left: request.x() - delta,
            top: request.y() + delta,
            step: 2.0 * delta / f64::from(request.pixels()),
        }
    }

    fn point(&self, px: u32, py: u32) -> (f64, f64) {
        (
            self.left + f64::from(px) * self.step,
            self.top - f64::from(py) * self.step,
        )
    }
}

/// Iterate `z <- z^2 + c` from `z = c`; true once `|z| > 2`
fn escapes(c_re: f64, c_im: f64, budget: u32) -> bool {
    let (mut z_re, mut z_im) = (c_re, c_im);
    for _ in 0..budget {
        if z_re * z_re + z_im * z_im > 4.0 {
            return true;
        }
        (z_re, z_im) = (z_re * z_re - z_im * z_im + c_re, 2.0 * z_re * z_im + c_im);
    }
    false
}
