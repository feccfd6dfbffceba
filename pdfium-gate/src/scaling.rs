//! Page scaling policy
//!
//! A document session renders every page through one [`ScalingPolicy`]:
//! either a viewport the page is fitted into, or a fixed pixels-per-point
//! factor (PPI / 72).

use crate::error::{PdfError, Result};

/// How native page dimensions map to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingPolicy {
    /// Fit the page inside `short_side x long_side`, preserving aspect ratio.
    Viewport { short_side: i32, long_side: i32 },
    /// Fixed pixels-per-point factor.
    Scale(f64),
}

impl ScalingPolicy {
    /// Fit pages into a viewport. `short_side` must not exceed `long_side`.
    ///
    /// # Example
    ///
    /// ```
    /// use pdfium_gate::ScalingPolicy;
    ///
    /// let policy = ScalingPolicy::viewport(1080, 1920)?;
    /// assert_eq!(policy.scale_for(595.0, 842.0), 1080.0 / 595.0);
    /// assert!(ScalingPolicy::viewport(1920, 1080).is_err());
    /// # Ok::<(), pdfium_gate::PdfError>(())
    /// ```
    pub fn viewport(short_side: i32, long_side: i32) -> Result<Self> {
        if short_side <= 0 {
            return Err(PdfError::invalid(
                "short_side",
                "value can't be less or equal to zero",
            ));
        }
        if long_side <= 0 {
            return Err(PdfError::invalid(
                "long_side",
                "value can't be less or equal to zero",
            ));
        }
        if short_side > long_side {
            return Err(PdfError::invalid(
                "short_side",
                "short_side can't be more than long_side",
            ));
        }
        Ok(ScalingPolicy::Viewport {
            short_side,
            long_side,
        })
    }

    /// Render at a fixed factor. Use `dpi / 72.0` to scale by resolution.
    pub fn scale(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PdfError::invalid(
                "scale",
                "value must be a finite number greater than zero",
            ));
        }
        Ok(ScalingPolicy::Scale(scale))
    }

    /// Uniform scale for a page of the given native size.
    pub fn scale_for(&self, width: f64, height: f64) -> f64 {
        match *self {
            ScalingPolicy::Scale(scale) => scale,
            ScalingPolicy::Viewport {
                short_side,
                long_side,
            } => {
                let short = f64::from(short_side) / width.min(height);
                let long = f64::from(long_side) / width.max(height);
                short.min(long)
            }
        }
    }
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        ScalingPolicy::Scale(1.0)
    }
}

/// Native dimension times scale, floored to whole pixels.
pub(crate) fn scaled_dimension(native: f64, scale: f64) -> u32 {
    let scaled = (native * scale).floor();
    if scaled.is_finite() && scaled > 0.0 {
        scaled.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}
