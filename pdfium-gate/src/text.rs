//! Per-glyph text metadata
//!
//! A [`Character`] is produced for every glyph the engine can place on the
//! page. All geometry is already in device pixels, the font size is scaled,
//! and the angle includes the page rotation.

use crate::coords::{BoundBox, CoordinateMapper, DevicePoint};
use crate::engine::{NativeEngine, RawHandle};

/// How a glyph is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextRenderMode {
    Unknown,
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl TextRenderMode {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => TextRenderMode::Fill,
            1 => TextRenderMode::Stroke,
            2 => TextRenderMode::FillStroke,
            3 => TextRenderMode::Invisible,
            4 => TextRenderMode::FillClip,
            5 => TextRenderMode::StrokeClip,
            6 => TextRenderMode::FillStrokeClip,
            7 => TextRenderMode::Clip,
            _ => TextRenderMode::Unknown,
        }
    }

    pub fn is_visible(self) -> bool {
        !matches!(
            self,
            TextRenderMode::Invisible | TextRenderMode::Clip | TextRenderMode::Unknown
        )
    }
}

/// Font name and descriptor flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontInfo {
    pub name: String,
    pub flags: i32,
}

/// One positioned glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    /// Index of the glyph in the page's text layer.
    pub index: usize,
    pub codepoint: char,
    /// Tight glyph box.
    pub bounds: BoundBox,
    /// Box covering the full font ascent and descent.
    pub loose_bounds: BoundBox,
    /// Font size in pixels at the session's scale.
    pub font_size: f64,
    /// Degrees clockwise, including page rotation, in `[0, 360)`.
    pub angle: f64,
    pub origin: DevicePoint,
    pub render_mode: TextRenderMode,
    /// RGBA.
    pub stroke_color: Option<[u8; 4]>,
    pub font_info: Option<FontInfo>,
}

/// Values shared by every glyph of one page session.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyphContext {
    pub scale: f64,
    pub mapper: CoordinateMapper,
}

impl Character {
    /// Read glyph `index`, or `None` if the engine has no box for it.
    pub(crate) fn read(
        engine: &mut dyn NativeEngine,
        text: RawHandle,
        index: i32,
        context: &GlyphContext,
    ) -> Option<Self> {
        let tight = engine.char_box(text, index)?;
        let mapper = &context.mapper;

        let bounds = mapper.map_rect(&tight);
        let loose_bounds = engine
            .char_loose_box(text, index)
            .map(|rect| mapper.map_rect(&rect))
            .unwrap_or(bounds);
        let origin = match engine.char_origin(text, index) {
            Some((x, y)) => mapper.to_device(x, y),
            None => mapper.to_device(tight.left, tight.bottom),
        };

        let codepoint =
            char::from_u32(engine.char_unicode(text, index)).unwrap_or(char::REPLACEMENT_CHARACTER);

        Some(Self {
            index: index as usize,
            codepoint,
            bounds,
            loose_bounds,
            font_size: scaled_font_size(engine.char_font_size(text, index), context.scale),
            angle: rotated_angle(
                engine.char_angle(text, index),
                mapper.rotation().degrees(),
            ),
            origin,
            render_mode: TextRenderMode::from_raw(engine.char_render_mode(text, index)),
            stroke_color: engine.char_stroke_color(text, index),
            font_info: engine
                .char_font_info(text, index)
                .map(|(name, flags)| FontInfo { name, flags }),
        })
    }
}

/// The engine reports 0 when it has no size and 1 for glyphs it could not
/// measure; both pass through unscaled.
pub(crate) fn scaled_font_size(raw: f64, scale: f64) -> f64 {
    if raw == 0.0 || raw == 1.0 {
        raw
    } else {
        raw * scale
    }
}

/// Engine angle (radians, negative when unknown) plus page rotation, in degrees.
pub(crate) fn rotated_angle(raw_radians: f32, rotation_degrees: f64) -> f64 {
    let base = if raw_radians < 0.0 {
        0.0
    } else {
        f64::from(raw_radians).to_degrees()
    };
    (base + rotation_degrees).rem_euclid(360.0)
}
