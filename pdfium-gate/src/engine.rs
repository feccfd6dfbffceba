//! The native engine seam
//!
//! [`NativeEngine`] is the narrow surface through which every call into the
//! PDF engine travels. It mirrors the engine's C API one call at a time and
//! keeps no ownership of its own: handles cross the trait as [`RawHandle`]
//! values and their lifetime is tracked by the handle arena.
//!
//! Every method takes `&mut self`. The only way to obtain `&mut dyn NativeEngine`
//! is through [`GlobalEngineGate`](crate::GlobalEngineGate), so holding the
//! reference means holding the gate.

use crate::coords::PageRect;
use std::path::Path;

/// Opaque, non-owning reference to a native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    /// Value returned by the engine on failure.
    pub const NULL: RawHandle = RawHandle(0);

    pub const fn new(value: usize) -> Self {
        RawHandle(value)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn value(&self) -> usize {
        self.0
    }

    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        RawHandle(ptr as usize)
    }

    pub fn as_ptr<T>(&self) -> *mut T {
        self.0 as *mut T
    }
}

/// Where a document is loaded from.
#[derive(Debug, Clone, Copy)]
pub enum DocumentSource<'a> {
    Path(&'a Path),
    /// The engine may read from the buffer lazily; the caller keeps it alive
    /// until the document handle is closed.
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Path> for DocumentSource<'a> {
    fn from(path: &'a Path) -> Self {
        DocumentSource::Path(path)
    }
}

impl<'a> From<&'a [u8]> for DocumentSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

/// Flags for "save as copy".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SaveMode {
    Incremental = 1,
    NoIncremental = 2,
    /// Write the document without its security handler.
    RemoveSecurity = 3,
}

impl SaveMode {
    pub fn flags(self) -> u32 {
        self as u32
    }
}

/// 2D affine transform `[a b 0; c d 0; e f 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Uniform scale with zero translation.
    pub fn scale(scale: f64) -> Self {
        Self::new(scale, 0.0, 0.0, scale, 0.0, 0.0)
    }
}

/// Single-threaded, non-reentrant PDF engine.
///
/// Implementations are thin pass-throughs. Failure is reported the way the
/// engine reports it: a null handle, `false`, or `None`, with details
/// available from [`last_error`](NativeEngine::last_error).
pub trait NativeEngine: Send {
    // Library

    fn init_library(&mut self);
    fn destroy_library(&mut self);
    fn last_error(&mut self) -> u32;

    // Documents

    fn load_document(&mut self, source: DocumentSource<'_>, password: Option<&str>) -> RawHandle;
    fn create_document(&mut self) -> RawHandle;
    fn close_document(&mut self, document: RawHandle);
    fn page_count(&mut self, document: RawHandle) -> i32;
    fn file_version(&mut self, document: RawHandle) -> Option<i32>;
    /// Import pages selected by a 1-based range string (`None` = all pages)
    /// into `dest` before page `insert_at` (0-based).
    fn import_pages(
        &mut self,
        dest: RawHandle,
        src: RawHandle,
        range: Option<&str>,
        insert_at: i32,
    ) -> bool;
    fn save_as_copy(&mut self, document: RawHandle, mode: SaveMode) -> Option<Vec<u8>>;

    // Forms

    fn init_form_environment(&mut self, document: RawHandle) -> RawHandle;
    fn exit_form_environment(&mut self, form: RawHandle);
    /// Draw form fields over a page already rendered into `bitmap`.
    fn draw_form_fields(
        &mut self,
        form: RawHandle,
        bitmap: RawHandle,
        page: RawHandle,
        width: i32,
        height: i32,
        flags: u32,
    );

    // Pages

    fn load_page(&mut self, document: RawHandle, index: i32) -> RawHandle;
    fn new_page(&mut self, document: RawHandle, index: i32, width: f64, height: f64) -> RawHandle;
    fn close_page(&mut self, page: RawHandle);
    fn page_width(&mut self, page: RawHandle) -> f64;
    fn page_height(&mut self, page: RawHandle) -> f64;
    fn page_rotation(&mut self, page: RawHandle) -> i32;
    fn generate_content(&mut self, page: RawHandle) -> bool;

    // Text

    fn load_text_page(&mut self, page: RawHandle) -> RawHandle;
    fn close_text_page(&mut self, text: RawHandle);
    fn count_chars(&mut self, text: RawHandle) -> i32;
    /// UTF-16 code units for `count` characters starting at `start`.
    fn text_range(&mut self, text: RawHandle, start: i32, count: i32) -> Vec<u16>;
    fn char_unicode(&mut self, text: RawHandle, index: i32) -> u32;
    fn char_font_size(&mut self, text: RawHandle, index: i32) -> f64;
    /// Radians; negative on failure.
    fn char_angle(&mut self, text: RawHandle, index: i32) -> f32;
    fn char_render_mode(&mut self, text: RawHandle, index: i32) -> i32;
    fn char_stroke_color(&mut self, text: RawHandle, index: i32) -> Option<[u8; 4]>;
    fn char_origin(&mut self, text: RawHandle, index: i32) -> Option<(f64, f64)>;
    fn char_box(&mut self, text: RawHandle, index: i32) -> Option<PageRect>;
    fn char_loose_box(&mut self, text: RawHandle, index: i32) -> Option<PageRect>;
    fn char_font_info(&mut self, text: RawHandle, index: i32) -> Option<(String, i32)>;

    // Bitmaps

    fn create_bitmap(&mut self, width: i32, height: i32, alpha: bool) -> RawHandle;
    fn render_page_bitmap(
        &mut self,
        bitmap: RawHandle,
        page: RawHandle,
        matrix: &Matrix,
        clip: &PageRect,
        flags: u32,
    ) -> bool;
    /// Packed B-G-R-A rows, `width * 4` bytes each.
    fn bitmap_bytes(&mut self, bitmap: RawHandle) -> Option<Vec<u8>>;
    fn destroy_bitmap(&mut self, bitmap: RawHandle);

    // Annotations

    fn annotation_count(&mut self, page: RawHandle) -> i32;
    fn open_annotation(&mut self, page: RawHandle, index: i32) -> RawHandle;
    fn close_annotation(&mut self, annotation: RawHandle);
    fn annotation_subtype(&mut self, annotation: RawHandle) -> i32;
    fn annotation_rect(&mut self, annotation: RawHandle) -> Option<PageRect>;
    /// Borrowed from the annotation; never closed separately.
    fn annotation_link(&mut self, annotation: RawHandle) -> RawHandle;
    /// Borrowed from the link; never closed separately.
    fn link_action(&mut self, link: RawHandle) -> RawHandle;
    fn action_type(&mut self, action: RawHandle) -> u32;
    /// Copies the NUL-terminated URI into `buffer` if it fits and returns the
    /// length the URI needs (0 if there is none).
    fn action_uri_path(&mut self, document: RawHandle, action: RawHandle, buffer: &mut [u8])
        -> usize;

    // Page objects

    fn new_image_object(&mut self, document: RawHandle) -> RawHandle;
    fn load_jpeg_inline(&mut self, page: RawHandle, image: RawHandle, data: &[u8]) -> bool;
    fn set_image_matrix(&mut self, image: RawHandle, matrix: &Matrix) -> bool;
    /// Ownership of `object` passes to the page.
    fn insert_page_object(&mut self, page: RawHandle, object: RawHandle);
    fn destroy_page_object(&mut self, object: RawHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_handle_null() {
        assert!(RawHandle::NULL.is_null());
        assert!(!RawHandle::new(7).is_null());
        let ptr = 0x1000usize as *mut u8;
        assert_eq!(RawHandle::from_ptr(ptr).as_ptr::<u8>(), ptr);
    }

    #[test]
    fn test_save_mode_flags() {
        assert_eq!(SaveMode::Incremental.flags(), 1);
        assert_eq!(SaveMode::NoIncremental.flags(), 2);
        assert_eq!(SaveMode::RemoveSecurity.flags(), 3);
    }
}
