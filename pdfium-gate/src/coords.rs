//! Page-space and device-space geometry
//!
//! Page space is the engine's unrotated user space: points, origin at the
//! bottom-left, y growing upwards. Device space is the rendered raster:
//! pixels, origin at the top-left, y growing downwards, after the page's
//! rotation and the session's scale have been applied.

use crate::error::{PdfError, Result};

/// Rectangle in page space, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PageRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> f64 {
        (self.top - self.bottom).abs()
    }
}

/// Pixel position in the rendered raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DevicePoint {
    pub x: i32,
    pub y: i32,
}

/// Axis-aligned pixel box with `left <= right` and `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self> {
        if left > right {
            return Err(PdfError::invalid(
                "left",
                "left coordinate can't be more than right coordinate",
            ));
        }
        if top > bottom {
            return Err(PdfError::invalid(
                "top",
                "top coordinate can't be more than bottom coordinate",
            ));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Box spanning two opposite corners given in any order.
    pub fn from_points(a: DevicePoint, b: DevicePoint) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Clockwise page rotation as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRotation {
    #[default]
    None,
    Clockwise90,
    Rotated180,
    Clockwise270,
}

impl PageRotation {
    /// Convert the engine's 0..3 quarter-turn code.
    pub fn from_raw(value: i32) -> Self {
        match value.rem_euclid(4) {
            1 => PageRotation::Clockwise90,
            2 => PageRotation::Rotated180,
            3 => PageRotation::Clockwise270,
            _ => PageRotation::None,
        }
    }

    pub fn quarter_turns(self) -> i32 {
        match self {
            PageRotation::None => 0,
            PageRotation::Clockwise90 => 1,
            PageRotation::Rotated180 => 2,
            PageRotation::Clockwise270 => 3,
        }
    }

    pub fn degrees(self) -> f64 {
        f64::from(self.quarter_turns()) * 90.0
    }

    /// Whether width and height swap between page and device space.
    pub fn is_sideways(self) -> bool {
        self.quarter_turns() % 2 == 1
    }
}

/// Page-to-device transform for one rendered page.
///
/// Equivalent to the engine's page-to-device conversion for a raster
/// starting at (0, 0), followed by clamping into the raster bounds.
/// Offsets of a non-zero media box origin are not applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    page_width: f64,
    page_height: f64,
    device_width: i32,
    device_height: i32,
    rotation: PageRotation,
}

impl CoordinateMapper {
    /// `page_width`/`page_height` are the page size as displayed (after
    /// rotation), matching what the engine reports for a page.
    pub fn new(
        page_width: f64,
        page_height: f64,
        device_width: i32,
        device_height: i32,
        rotation: PageRotation,
    ) -> Self {
        let (page_width, page_height) = if rotation.is_sideways() {
            (page_height, page_width)
        } else {
            (page_width, page_height)
        };
        Self {
            page_width,
            page_height,
            device_width,
            device_height,
            rotation,
        }
    }

    pub fn rotation(&self) -> PageRotation {
        self.rotation
    }

    /// Map a page-space point to a clamped device pixel.
    pub fn to_device(&self, x: f64, y: f64) -> DevicePoint {
        let (w, h) = (self.page_width, self.page_height);
        let (dw, dh) = (f64::from(self.device_width), f64::from(self.device_height));
        if w <= 0.0 || h <= 0.0 {
            return DevicePoint::default();
        }

        let (dx, dy) = match self.rotation {
            PageRotation::None => (x * dw / w, dh - y * dh / h),
            PageRotation::Clockwise90 => (y * dw / h, x * dh / w),
            PageRotation::Rotated180 => (dw - x * dw / w, y * dh / h),
            PageRotation::Clockwise270 => (dw - y * dw / h, dh - x * dh / w),
        };

        DevicePoint {
            x: clamp_axis(dx, self.device_width),
            y: clamp_axis(dy, self.device_height),
        }
    }

    /// Map a page-space rectangle to a normalized device box.
    pub fn map_rect(&self, rect: &PageRect) -> BoundBox {
        let a = self.to_device(rect.left, rect.top);
        let b = self.to_device(rect.right, rect.bottom);
        BoundBox::from_points(a, b)
    }
}

fn clamp_axis(value: f64, dimension: i32) -> i32 {
    let max = (dimension - 1).max(0);
    if !value.is_finite() {
        return 0;
    }
    let rounded = value.round();
    if rounded <= 0.0 {
        0
    } else if rounded >= f64::from(max) {
        max
    } else {
        rounded as i32
    }
}
