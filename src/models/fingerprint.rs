//! Deterministic cache identity for render requests

use std::fmt;

use super::RenderRequest;

/// Cache key derived from every field of a [`RenderRequest`]
///
/// Format: `{x}-{y}-{zoom}-{pixels}`, coordinates in shortest round-trip
/// scientific notation with a signed, two-digit exponent (`0E+00`, `-2.5E-01`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(request: &RenderRequest) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            format_coordinate(request.x()),
            format_coordinate(request.y()),
            request.zoom(),
            request.pixels()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the cache entry holding the encoded bitmap
    pub fn file_name(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn format_coordinate(value: f64) -> String {
    // `{:E}` yields the shortest round-trip mantissa, e.g. "1.5E0" / "2.5E-1"
    let raw = format!("{value:E}");
    match raw.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exponent.unsigned_abs())
        }
        None => raw,
    }
}
