//! Common value types.

use serde::{Deserialize, Serialize};

/// Page viewport in CSS pixels.
///
/// Both dimensions are always positive. Client-supplied dimensions go through
/// [`Viewport::with_overrides`] or [`Viewport::resized`]; neither ever
/// collapses a dimension to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;
    /// Largest dimension accepted from a client.
    pub const MAX_DIMENSION: u32 = 16_384;

    /// Create a viewport, rejecting zero or oversized dimensions.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let valid = |v: u32| v > 0 && v <= Self::MAX_DIMENSION;
        (valid(width) && valid(height)).then_some(Self { width, height })
    }

    /// Apply client-supplied dimensions field by field. Anything missing,
    /// non-positive or out of range keeps this viewport's value.
    pub fn with_overrides(&self, width: Option<f64>, height: Option<f64>) -> Self {
        Self {
            width: dimension(width).unwrap_or(self.width),
            height: dimension(height).unwrap_or(self.height),
        }
    }

    /// Apply a resize request. A missing dimension keeps its current value;
    /// any supplied but invalid dimension rejects the whole request.
    pub fn resized(&self, width: Option<f64>, height: Option<f64>) -> Self {
        let width = match width {
            Some(w) => dimension(Some(w)),
            None => Some(self.width),
        };
        let height = match height {
            Some(h) => dimension(Some(h)),
            None => Some(self.height),
        };
        match (width, height) {
            (Some(width), Some(height)) => Self { width, height },
            _ => *self,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn dimension(value: Option<f64>) -> Option<u32> {
    let value = value?.floor();
    if value.is_finite() && value >= 1.0 && value <= f64::from(Viewport::MAX_DIMENSION) {
        Some(value as u32)
    } else {
        None
    }
}
