//! Page sessions: size, text, glyphs, rasters and links

use crate::annotation::{read_action_uri, ActionType, AnnotationSubtype, UriAnnotation};
use crate::convert::ImageBytesConverter;
use crate::coords::{CoordinateMapper, PageRect, PageRotation};
use crate::document::DocumentSession;
use crate::engine::Matrix;
use crate::error::{PdfError, Result};
use crate::gate::EngineState;
use crate::handle::{HandleId, HandleKind};
use crate::scaling::scaled_dimension;
use crate::text::{Character, GlyphContext};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicBool, Ordering};

/// Render flags passed through to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderFlags(u32);

impl RenderFlags {
    pub const NONE: RenderFlags = RenderFlags(0);
    /// Draw annotations and form fields.
    pub const RENDER_ANNOTATIONS: RenderFlags = RenderFlags(0x01);
    /// Optimize text for LCD displays.
    pub const LCD_TEXT: RenderFlags = RenderFlags(0x02);
    /// Don't use native text output.
    pub const NO_NATIVE_TEXT: RenderFlags = RenderFlags(0x04);
    pub const GRAYSCALE: RenderFlags = RenderFlags(0x08);
    /// Limit the image cache size.
    pub const LIMIT_IMAGE_CACHE: RenderFlags = RenderFlags(0x200);
    /// Always use halftone for image stretching.
    pub const FORCE_HALFTONE: RenderFlags = RenderFlags(0x400);
    /// Render for printing.
    pub const PRINTING: RenderFlags = RenderFlags(0x800);
    pub const NO_SMOOTH_TEXT: RenderFlags = RenderFlags(0x1000);
    pub const NO_SMOOTH_IMAGE: RenderFlags = RenderFlags(0x2000);
    pub const NO_SMOOTH_PATH: RenderFlags = RenderFlags(0x4000);

    pub fn from_bits(bits: u32) -> Self {
        RenderFlags(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: RenderFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RenderFlags {
    type Output = RenderFlags;

    fn bitor(self, rhs: RenderFlags) -> RenderFlags {
        RenderFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderFlags {
    fn bitor_assign(&mut self, rhs: RenderFlags) {
        self.0 |= rhs.0;
    }
}

/// An open page of a [`DocumentSession`].
///
/// Holds the page handle and its text handle. The scale is computed from the
/// document's [`ScalingPolicy`](crate::ScalingPolicy) when the page opens
/// and stays fixed for the session.
pub struct PageSession<'doc> {
    document: &'doc DocumentSession,
    page: HandleId,
    text: HandleId,
    index: usize,
    scale: f64,
    disposed: AtomicBool,
}

/// Native size and rotation read in one gate entry.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    width: f64,
    height: f64,
    rotation: PageRotation,
}

impl<'doc> PageSession<'doc> {
    pub(crate) fn open(document: &'doc DocumentSession, index: usize) -> Result<Self> {
        document.check()?;
        let doc_id = document.handle();
        let policy = document.dimensions();

        let (page, text, scale) = document.library().gate().with_engine(|state| {
            let doc = state.raw(doc_id)?;
            let count = state.engine().page_count(doc).max(0) as usize;
            let page_index = i32::try_from(index)
                .ok()
                .filter(|_| index < count)
                .ok_or(PdfError::PageOpenFailed { index, count })?;

            let mut scope = state.scope();
            let page = scope
                .acquire(HandleKind::Page, doc_id, |engine| engine.load_page(doc, page_index))?
                .ok_or(PdfError::PageOpenFailed { index, count })?;
            let page_raw = scope.raw(page)?;
            let text = scope
                .acquire(HandleKind::TextPage, page, |engine| engine.load_text_page(page_raw))?
                .ok_or(PdfError::PageTextOpenFailed { index })?;

            let width = scope.engine().page_width(page_raw);
            let height = scope.engine().page_height(page_raw);
            let scale = policy.scale_for(width, height);

            scope.keep(page);
            scope.keep(text);
            Ok((page, text, scale))
        })?;

        Ok(Self {
            document,
            page,
            text,
            index,
            scale,
            disposed: AtomicBool::new(false),
        })
    }

    fn check(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(PdfError::SessionDisposed);
        }
        self.document.check()
    }

    fn with_engine<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineState) -> Result<T>,
    {
        self.check()?;
        self.document.library().gate().with_engine(f)
    }

    fn read_geometry(state: &mut EngineState, page: HandleId) -> Result<Geometry> {
        let raw = state.raw(page)?;
        let engine = state.engine();
        Ok(Geometry {
            width: engine.page_width(raw),
            height: engine.page_height(raw),
            rotation: PageRotation::from_raw(engine.page_rotation(raw)),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Pixels per point for this page.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Rendered width in pixels (native width times scale, floored).
    pub fn width(&self) -> Result<u32> {
        let width = self.with_engine(|state| {
            let raw = state.raw(self.page)?;
            Ok(state.engine().page_width(raw))
        })?;
        Ok(scaled_dimension(width, self.scale))
    }

    /// Rendered height in pixels (native height times scale, floored).
    pub fn height(&self) -> Result<u32> {
        let height = self.with_engine(|state| {
            let raw = state.raw(self.page)?;
            Ok(state.engine().page_height(raw))
        })?;
        Ok(scaled_dimension(height, self.scale))
    }

    pub fn rotation(&self) -> Result<PageRotation> {
        self.with_engine(|state| {
            let raw = state.raw(self.page)?;
            Ok(PageRotation::from_raw(state.engine().page_rotation(raw)))
        })
    }

    /// All text on the page as one string. A page without text yields `""`.
    pub fn text(&self) -> Result<String> {
        let units = self.with_engine(|state| {
            let raw = state.raw(self.text)?;
            let engine = state.engine();
            let count = engine.count_chars(raw);
            if count <= 0 {
                return Ok(Vec::new());
            }
            Ok(engine.text_range(raw, 0, count))
        })?;

        let end = units
            .iter()
            .rposition(|&unit| unit != 0)
            .map_or(0, |last| last + 1);
        Ok(String::from_utf16_lossy(&units[..end]))
    }

    /// Lazily read glyphs with their device-space geometry.
    ///
    /// Each item takes the gate once. Glyphs without a retrievable box are
    /// skipped. Call again to start over.
    pub fn characters(&self) -> Result<Characters<'_, 'doc>> {
        let (count, geometry) = self.with_engine(|state| {
            let raw = state.raw(self.text)?;
            let count = state.engine().count_chars(raw).max(0);
            Ok((count, Self::read_geometry(state, self.page)?))
        })?;

        let mapper = CoordinateMapper::new(
            geometry.width,
            geometry.height,
            scaled_dimension(geometry.width, self.scale) as i32,
            scaled_dimension(geometry.height, self.scale) as i32,
            geometry.rotation,
        );

        Ok(Characters {
            page: self,
            next: 0,
            count,
            context: GlyphContext {
                scale: self.scale,
                mapper,
            },
        })
    }

    /// Render to a B-G-R-A buffer of `width * height * 4` bytes.
    ///
    /// The background is transparent; see
    /// [`NaiveTransparencyRemover`](crate::NaiveTransparencyRemover).
    pub fn image(&self, flags: RenderFlags) -> Result<Vec<u8>> {
        let form = self.document.form();
        let scale = self.scale;
        let index = self.index;

        self.with_engine(|state| {
            let geometry = Self::read_geometry(state, self.page)?;
            let width = scaled_dimension(geometry.width, scale) as i32;
            let height = scaled_dimension(geometry.height, scale) as i32;
            let page_raw = state.raw(self.page)?;
            let form_raw = match form {
                Some(form) => Some(state.raw(form)?),
                None => None,
            };

            let mut scope = state.scope();
            let bitmap = scope
                .acquire(HandleKind::Bitmap, self.page, |engine| {
                    engine.create_bitmap(width, height, true)
                })?
                .ok_or_else(|| render_error(index, "engine could not allocate a bitmap"))?;
            let bitmap_raw = scope.raw(bitmap)?;

            let matrix = Matrix::scale(scale);
            let clip = PageRect::new(0.0, 0.0, f64::from(width), f64::from(height));
            let engine = scope.engine();
            if !engine.render_page_bitmap(bitmap_raw, page_raw, &matrix, &clip, flags.bits()) {
                return Err(render_error(index, "engine reported a render failure"));
            }
            if let Some(form_raw) = form_raw {
                if flags.contains(RenderFlags::RENDER_ANNOTATIONS) {
                    engine.draw_form_fields(
                        form_raw,
                        bitmap_raw,
                        page_raw,
                        width,
                        height,
                        flags.bits(),
                    );
                }
            }

            // The bitmap is destroyed with the scope on every path.
            engine
                .bitmap_bytes(bitmap_raw)
                .ok_or_else(|| render_error(index, "engine returned no pixel buffer"))
        })
    }

    /// Render, then run `converter` over the buffer outside the gate.
    pub fn image_with<C>(&self, converter: &C, flags: RenderFlags) -> Result<Vec<u8>>
    where
        C: ImageBytesConverter + ?Sized,
    {
        let mut bytes = self.image(flags)?;
        converter.convert(&mut bytes);
        Ok(bytes)
    }

    /// Link annotations with URI actions, with device-space rectangles.
    pub fn uri_annotations(&self) -> Result<Vec<UriAnnotation>> {
        let doc_id = self.document.handle();
        let scale = self.scale;

        self.with_engine(|state| {
            let geometry = Self::read_geometry(state, self.page)?;
            let mapper = CoordinateMapper::new(
                geometry.width,
                geometry.height,
                scaled_dimension(geometry.width, scale) as i32,
                scaled_dimension(geometry.height, scale) as i32,
                geometry.rotation,
            );
            let doc_raw = state.raw(doc_id)?;
            let page_raw = state.raw(self.page)?;
            let count = state.engine().annotation_count(page_raw);

            let mut links = Vec::new();
            for i in 0..count.max(0) {
                let mut scope = state.scope();
                let Some(annotation) = scope.acquire(HandleKind::Annotation, self.page, |engine| {
                    engine.open_annotation(page_raw, i)
                })?
                else {
                    continue;
                };
                let raw = scope.raw(annotation)?;
                let engine = scope.engine();

                if AnnotationSubtype::from_raw(engine.annotation_subtype(raw))
                    != AnnotationSubtype::Link
                {
                    continue;
                }
                let link = engine.annotation_link(raw);
                if link.is_null() {
                    continue;
                }
                let action = engine.link_action(link);
                if action.is_null() || ActionType::from_raw(engine.action_type(action)) != ActionType::Uri
                {
                    continue;
                }
                let (Some(uri), Some(rect)) = (
                    read_action_uri(engine, doc_raw, action),
                    engine.annotation_rect(raw),
                ) else {
                    continue;
                };
                links.push(UriAnnotation {
                    uri,
                    bounds: mapper.map_rect(&rect),
                });
            }
            Ok(links)
        })
    }

    /// Release the text handle, then the page handle. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.document.library().gate().with_state(|state| {
            state.release(self.text);
            state.release(self.page);
            Ok(())
        });
        if result.is_err() {
            self.disposed.store(false, Ordering::SeqCst);
        }
        result
    }
}

impl Drop for PageSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close page {}: {}", self.index, e);
        }
    }
}

impl fmt::Debug for PageSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSession")
            .field("index", &self.index)
            .field("scale", &self.scale)
            .field("closed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Lazy, finite sequence of a page's glyphs.
pub struct Characters<'p, 'doc> {
    page: &'p PageSession<'doc>,
    next: i32,
    count: i32,
    context: GlyphContext,
}

impl Iterator for Characters<'_, '_> {
    type Item = Result<Character>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let text = self.page.text;
        let context = self.context;
        let start = self.next;
        let count = self.count;

        let found = self.page.with_engine(|state| {
            let raw = state.raw(text)?;
            let engine = state.engine();
            let mut index = start;
            while index < count {
                let glyph = Character::read(engine, raw, index, &context);
                index += 1;
                match glyph {
                    Some(glyph) => return Ok((index, Some(glyph))),
                    None => log::trace!("glyph {} has no box; skipped", index - 1),
                }
            }
            Ok((index, None))
        });

        match found {
            Ok((next, glyph)) => {
                self.next = next;
                glyph.map(Ok)
            }
            Err(e) => {
                self.next = self.count;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count.saturating_sub(self.next).max(0) as usize))
    }
}

fn render_error(index: usize, reason: &str) -> PdfError {
    PdfError::RenderFailed {
        index,
        reason: reason.to_string(),
    }
}
