//! PDFium engine bound at runtime through `pdfium-render`'s raw bindings
//!
//! Only the FPDF functions the sessions need are used. All of them go
//! through [`NativeEngine`], so they run under the engine gate.

use crate::coords::PageRect;
use crate::engine::{DocumentSource, Matrix, NativeEngine, RawHandle, SaveMode};
use crate::error::{PdfError, Result};
use pdfium_render::bindgen::{
    FPDF_FILEACCESS, FPDF_FILEWRITE_, FPDF_FORMFILLINFO, FPDF_PAGE, FS_MATRIX, FS_RECTF,
};
use pdfium_render::prelude::{Pdfium, PdfiumLibraryBindings};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::{c_int, c_uchar, c_ulong};
use std::path::{Path, PathBuf};

/// Environment variable naming the directory that holds the PDFium library.
pub const PDFIUM_LIB_DIR_ENV: &str = "PDFIUM_LIB_DIR";

/// `FPDF_ERR_FILE`, reported for paths the engine can't be handed.
const ERR_FILE: u32 = 2;

/// `FPDF_FORMFILLINFO` versions, tried in order until one is accepted.
const FORM_INFO_VERSIONS: [c_int; 2] = [1, 2];

/// Where to find the PDFium shared library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfiumConfig {
    library_dir: Option<PathBuf>,
}

impl PdfiumConfig {
    /// Look in the working directory, then the system library path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind only the library in `dir`.
    pub fn library_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Use the directory in `PDFIUM_LIB_DIR` when it is set.
    pub fn from_env() -> Self {
        match std::env::var_os(PDFIUM_LIB_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new().library_dir(dir),
            _ => Self::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.library_dir.as_deref()
    }
}

/// [`NativeEngine`] backed by PDFium.
pub struct PdfiumEngine {
    bindings: Box<dyn PdfiumLibraryBindings>,
    // FPDF_FORMFILLINFO must outlive its form handle.
    forms: HashMap<usize, Box<FPDF_FORMFILLINFO>>,
    pending_error: Option<u32>,
}

// SAFETY: PDFium tolerates calls from any thread as long as they never
// overlap. The engine is only reachable through the gate's mutex, which
// serializes every call, and none of the raw pointers it stores are shared.
unsafe impl Send for PdfiumEngine {}

impl PdfiumEngine {
    /// Bind the shared library described by `config`.
    pub fn bind(config: &PdfiumConfig) -> Result<Self> {
        let bindings = match config.dir() {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| PdfError::BindFailed {
            reason: format!("{:?}", e),
        })?;

        log::debug!("bound PDFium library");
        Ok(Self {
            bindings,
            forms: HashMap::new(),
            pending_error: None,
        })
    }
}

fn rect_from(rect: &FS_RECTF) -> PageRect {
    PageRect::new(
        f64::from(rect.left),
        f64::from(rect.top),
        f64::from(rect.right),
        f64::from(rect.bottom),
    )
}

fn empty_rect() -> FS_RECTF {
    FS_RECTF {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    }
}

/// FPDF_FILEWRITE with the output buffer appended after the C fields.
#[repr(C)]
struct BufferWriter {
    version: c_int,
    write_block: Option<extern "C" fn(*mut FPDF_FILEWRITE_, *const c_void, c_ulong) -> c_int>,
    buffer: *const RefCell<Vec<u8>>,
}

extern "C" fn write_block(this: *mut FPDF_FILEWRITE_, data: *const c_void, size: c_ulong) -> c_int {
    // SAFETY: `this` is the BufferWriter handed to FPDF_SaveAsCopy, and its
    // buffer outlives the call.
    unsafe {
        let writer = &*(this as *const BufferWriter);
        let chunk = std::slice::from_raw_parts(data as *const u8, size as usize);
        (*writer.buffer).borrow_mut().extend_from_slice(chunk);
    }
    1
}

/// Reads a byte slice for FPDFImageObj_LoadJpegFileInline.
struct SliceReader<'a> {
    data: &'a [u8],
}

unsafe extern "C" fn read_block(
    param: *mut c_void,
    position: c_ulong,
    buf: *mut c_uchar,
    size: c_ulong,
) -> c_int {
    let reader = &*(param as *const SliceReader<'_>);
    let start = position as usize;
    let Some(end) = start.checked_add(size as usize) else {
        return 0;
    };
    if end > reader.data.len() {
        return 0;
    }
    std::ptr::copy_nonoverlapping(reader.data.as_ptr().add(start), buf, size as usize);
    1
}

impl NativeEngine for PdfiumEngine {
    fn init_library(&mut self) {
        self.bindings.FPDF_InitLibrary();
    }

    fn destroy_library(&mut self) {
        self.bindings.FPDF_DestroyLibrary();
    }

    fn last_error(&mut self) -> u32 {
        match self.pending_error.take() {
            Some(code) => code,
            None => self.bindings.FPDF_GetLastError() as u32,
        }
    }

    fn load_document(&mut self, source: DocumentSource<'_>, password: Option<&str>) -> RawHandle {
        self.pending_error = None;
        let document = match source {
            DocumentSource::Path(path) => match path.to_str() {
                Some(path) => self.bindings.FPDF_LoadDocument(path, password),
                None => {
                    self.pending_error = Some(ERR_FILE);
                    return RawHandle::NULL;
                }
            },
            DocumentSource::Bytes(bytes) => self.bindings.FPDF_LoadMemDocument64(bytes, password),
        };
        RawHandle::from_ptr(document)
    }

    fn create_document(&mut self) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDF_CreateNewDocument())
    }

    fn close_document(&mut self, document: RawHandle) {
        self.bindings.FPDF_CloseDocument(document.as_ptr());
    }

    fn page_count(&mut self, document: RawHandle) -> i32 {
        self.bindings.FPDF_GetPageCount(document.as_ptr())
    }

    fn file_version(&mut self, document: RawHandle) -> Option<i32> {
        let mut version: c_int = 0;
        let ok = self
            .bindings
            .FPDF_GetFileVersion(document.as_ptr(), &mut version);
        (ok != 0).then_some(version)
    }

    fn import_pages(
        &mut self,
        dest: RawHandle,
        src: RawHandle,
        range: Option<&str>,
        insert_at: i32,
    ) -> bool {
        let all;
        let range = match range {
            Some(range) => range,
            None => {
                let count = self.bindings.FPDF_GetPageCount(src.as_ptr());
                if count <= 0 {
                    return false;
                }
                all = format!("1-{}", count);
                &all
            }
        };
        self.bindings
            .FPDF_ImportPages(dest.as_ptr(), src.as_ptr(), range, insert_at)
            != 0
    }

    fn save_as_copy(&mut self, document: RawHandle, mode: SaveMode) -> Option<Vec<u8>> {
        let buffer = Box::new(RefCell::new(Vec::<u8>::new()));
        let mut writer = BufferWriter {
            version: 1,
            write_block: Some(write_block),
            buffer: buffer.as_ref() as *const RefCell<Vec<u8>>,
        };

        let ok = self.bindings.FPDF_SaveAsCopy(
            document.as_ptr(),
            &mut writer as *mut BufferWriter as *mut FPDF_FILEWRITE_,
            mode.flags() as _,
        );
        (ok != 0).then(|| buffer.into_inner())
    }

    fn init_form_environment(&mut self, document: RawHandle) -> RawHandle {
        for version in FORM_INFO_VERSIONS {
            // SAFETY: FPDF_FORMFILLINFO is plain C data; null callbacks are allowed.
            let mut info: Box<FPDF_FORMFILLINFO> = Box::new(unsafe { std::mem::zeroed() });
            info.version = version;
            let form = RawHandle::from_ptr(
                self.bindings
                    .FPDFDOC_InitFormFillEnvironment(document.as_ptr(), info.as_mut()),
            );
            if !form.is_null() {
                self.forms.insert(form.value(), info);
                return form;
            }
            log::debug!("form environment version {} rejected", version);
        }
        RawHandle::NULL
    }

    fn exit_form_environment(&mut self, form: RawHandle) {
        self.bindings.FPDFDOC_ExitFormFillEnvironment(form.as_ptr());
        self.forms.remove(&form.value());
    }

    fn draw_form_fields(
        &mut self,
        form: RawHandle,
        bitmap: RawHandle,
        page: RawHandle,
        width: i32,
        height: i32,
        flags: u32,
    ) {
        // The page's own /Rotate is already applied by the render call.
        self.bindings.FPDF_FFLDraw(
            form.as_ptr(),
            bitmap.as_ptr(),
            page.as_ptr(),
            0,
            0,
            width,
            height,
            0,
            flags as c_int,
        );
    }

    fn load_page(&mut self, document: RawHandle, index: i32) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDF_LoadPage(document.as_ptr(), index))
    }

    fn new_page(&mut self, document: RawHandle, index: i32, width: f64, height: f64) -> RawHandle {
        RawHandle::from_ptr(
            self.bindings
                .FPDFPage_New(document.as_ptr(), index, width, height),
        )
    }

    fn close_page(&mut self, page: RawHandle) {
        self.bindings.FPDF_ClosePage(page.as_ptr());
    }

    fn page_width(&mut self, page: RawHandle) -> f64 {
        f64::from(self.bindings.FPDF_GetPageWidthF(page.as_ptr()))
    }

    fn page_height(&mut self, page: RawHandle) -> f64 {
        f64::from(self.bindings.FPDF_GetPageHeightF(page.as_ptr()))
    }

    fn page_rotation(&mut self, page: RawHandle) -> i32 {
        self.bindings.FPDFPage_GetRotation(page.as_ptr())
    }

    fn generate_content(&mut self, page: RawHandle) -> bool {
        self.bindings.FPDFPage_GenerateContent(page.as_ptr()) != 0
    }

    fn load_text_page(&mut self, page: RawHandle) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDFText_LoadPage(page.as_ptr()))
    }

    fn close_text_page(&mut self, text: RawHandle) {
        self.bindings.FPDFText_ClosePage(text.as_ptr());
    }

    fn count_chars(&mut self, text: RawHandle) -> i32 {
        self.bindings.FPDFText_CountChars(text.as_ptr())
    }

    fn text_range(&mut self, text: RawHandle, start: i32, count: i32) -> Vec<u16> {
        if count <= 0 {
            return Vec::new();
        }
        // Room for the terminating NUL.
        let mut buffer = vec![0u16; count as usize + 1];
        let written = self
            .bindings
            .FPDFText_GetText(text.as_ptr(), start, count, buffer.as_mut_ptr());
        buffer.truncate(written.max(0) as usize);
        buffer
    }

    fn char_unicode(&mut self, text: RawHandle, index: i32) -> u32 {
        self.bindings.FPDFText_GetUnicode(text.as_ptr(), index) as u32
    }

    fn char_font_size(&mut self, text: RawHandle, index: i32) -> f64 {
        self.bindings.FPDFText_GetFontSize(text.as_ptr(), index)
    }

    fn char_angle(&mut self, text: RawHandle, index: i32) -> f32 {
        self.bindings.FPDFText_GetCharAngle(text.as_ptr(), index)
    }

    fn char_render_mode(&mut self, text: RawHandle, index: i32) -> i32 {
        let object = self.bindings.FPDFText_GetTextObject(text.as_ptr(), index);
        if object.is_null() {
            return -1;
        }
        self.bindings.FPDFTextObj_GetTextRenderMode(object) as i32
    }

    fn char_stroke_color(&mut self, text: RawHandle, index: i32) -> Option<[u8; 4]> {
        let (mut r, mut g, mut b, mut a) = (0, 0, 0, 0);
        let ok = self.bindings.FPDFText_GetStrokeColor(
            text.as_ptr(),
            index,
            &mut r,
            &mut g,
            &mut b,
            &mut a,
        );
        (ok != 0).then(|| [r as u8, g as u8, b as u8, a as u8])
    }

    fn char_origin(&mut self, text: RawHandle, index: i32) -> Option<(f64, f64)> {
        let (mut x, mut y) = (0.0, 0.0);
        let ok = self
            .bindings
            .FPDFText_GetCharOrigin(text.as_ptr(), index, &mut x, &mut y);
        (ok != 0).then_some((x, y))
    }

    fn char_box(&mut self, text: RawHandle, index: i32) -> Option<PageRect> {
        let (mut left, mut right, mut bottom, mut top) = (0.0, 0.0, 0.0, 0.0);
        let ok = self.bindings.FPDFText_GetCharBox(
            text.as_ptr(),
            index,
            &mut left,
            &mut right,
            &mut bottom,
            &mut top,
        );
        (ok != 0).then(|| PageRect::new(left, top, right, bottom))
    }

    fn char_loose_box(&mut self, text: RawHandle, index: i32) -> Option<PageRect> {
        let mut rect = empty_rect();
        let ok = self
            .bindings
            .FPDFText_GetLooseCharBox(text.as_ptr(), index, &mut rect);
        (ok != 0).then(|| rect_from(&rect))
    }

    fn char_font_info(&mut self, text: RawHandle, index: i32) -> Option<(String, i32)> {
        let mut flags: c_int = 0;
        let needed = self.bindings.FPDFText_GetFontInfo(
            text.as_ptr(),
            index,
            std::ptr::null_mut(),
            0,
            &mut flags,
        ) as usize;
        if needed == 0 {
            return None;
        }
        let mut name = vec![0u8; needed];
        let written = self.bindings.FPDFText_GetFontInfo(
            text.as_ptr(),
            index,
            name.as_mut_ptr() as *mut c_void,
            needed as c_ulong,
            &mut flags,
        ) as usize;
        name.truncate(written.min(needed));
        while name.last() == Some(&0) {
            name.pop();
        }
        Some((String::from_utf8_lossy(&name).into_owned(), flags))
    }

    fn create_bitmap(&mut self, width: i32, height: i32, alpha: bool) -> RawHandle {
        RawHandle::from_ptr(
            self.bindings
                .FPDFBitmap_Create(width, height, c_int::from(alpha)),
        )
    }

    fn render_page_bitmap(
        &mut self,
        bitmap: RawHandle,
        page: RawHandle,
        matrix: &Matrix,
        clip: &PageRect,
        flags: u32,
    ) -> bool {
        let matrix = FS_MATRIX {
            a: matrix.a as f32,
            b: matrix.b as f32,
            c: matrix.c as f32,
            d: matrix.d as f32,
            e: matrix.e as f32,
            f: matrix.f as f32,
        };
        let clip = FS_RECTF {
            left: clip.left as f32,
            top: clip.top as f32,
            right: clip.right as f32,
            bottom: clip.bottom as f32,
        };
        self.bindings.FPDF_RenderPageBitmapWithMatrix(
            bitmap.as_ptr(),
            page.as_ptr(),
            &matrix,
            &clip,
            flags as c_int,
        );
        // FPDF_RenderPageBitmapWithMatrix reports no status.
        true
    }

    fn bitmap_bytes(&mut self, bitmap: RawHandle) -> Option<Vec<u8>> {
        let handle = bitmap.as_ptr();
        let width = self.bindings.FPDFBitmap_GetWidth(handle).max(0) as usize;
        let height = self.bindings.FPDFBitmap_GetHeight(handle).max(0) as usize;
        let stride = self.bindings.FPDFBitmap_GetStride(handle).max(0) as usize;
        let buffer = self.bindings.FPDFBitmap_GetBuffer(handle) as *const u8;
        let row = width * 4;
        if buffer.is_null() || stride < row {
            return None;
        }

        // SAFETY: PDFium owns `height * stride` bytes at `buffer` until the
        // bitmap is destroyed, which can't happen while the gate is held here.
        let pixels = unsafe { std::slice::from_raw_parts(buffer, stride * height) };
        let mut bytes = Vec::with_capacity(row * height);
        for line in pixels.chunks_exact(stride) {
            bytes.extend_from_slice(&line[..row]);
        }
        Some(bytes)
    }

    fn destroy_bitmap(&mut self, bitmap: RawHandle) {
        self.bindings.FPDFBitmap_Destroy(bitmap.as_ptr());
    }

    fn annotation_count(&mut self, page: RawHandle) -> i32 {
        self.bindings.FPDFPage_GetAnnotCount(page.as_ptr())
    }

    fn open_annotation(&mut self, page: RawHandle, index: i32) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDFPage_GetAnnot(page.as_ptr(), index))
    }

    fn close_annotation(&mut self, annotation: RawHandle) {
        self.bindings.FPDFPage_CloseAnnot(annotation.as_ptr());
    }

    fn annotation_subtype(&mut self, annotation: RawHandle) -> i32 {
        self.bindings.FPDFAnnot_GetSubtype(annotation.as_ptr()) as i32
    }

    fn annotation_rect(&mut self, annotation: RawHandle) -> Option<PageRect> {
        let mut rect = empty_rect();
        let ok = self
            .bindings
            .FPDFAnnot_GetRect(annotation.as_ptr(), &mut rect);
        (ok != 0).then(|| rect_from(&rect))
    }

    fn annotation_link(&mut self, annotation: RawHandle) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDFAnnot_GetLink(annotation.as_ptr()))
    }

    fn link_action(&mut self, link: RawHandle) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDFLink_GetAction(link.as_ptr()))
    }

    fn action_type(&mut self, action: RawHandle) -> u32 {
        self.bindings.FPDFAction_GetType(action.as_ptr()) as u32
    }

    fn action_uri_path(&mut self, document: RawHandle, action: RawHandle, buffer: &mut [u8]) -> usize {
        self.bindings.FPDFAction_GetURIPath(
            document.as_ptr(),
            action.as_ptr(),
            buffer.as_mut_ptr() as *mut c_void,
            buffer.len() as c_ulong,
        ) as usize
    }

    fn new_image_object(&mut self, document: RawHandle) -> RawHandle {
        RawHandle::from_ptr(self.bindings.FPDFPageObj_NewImageObj(document.as_ptr()))
    }

    fn load_jpeg_inline(&mut self, page: RawHandle, image: RawHandle, data: &[u8]) -> bool {
        let reader = SliceReader { data };
        let mut access = FPDF_FILEACCESS {
            m_FileLen: data.len() as c_ulong,
            m_GetBlock: Some(read_block),
            m_Param: &reader as *const SliceReader<'_> as *mut c_void,
        };
        let mut pages: [FPDF_PAGE; 1] = [page.as_ptr()];
        self.bindings.FPDFImageObj_LoadJpegFileInline(
            pages.as_mut_ptr(),
            1,
            image.as_ptr(),
            &mut access,
        ) != 0
    }

    fn set_image_matrix(&mut self, image: RawHandle, matrix: &Matrix) -> bool {
        self.bindings.FPDFImageObj_SetMatrix(
            image.as_ptr(),
            matrix.a,
            matrix.b,
            matrix.c,
            matrix.d,
            matrix.e,
            matrix.f,
        ) != 0
    }

    fn insert_page_object(&mut self, page: RawHandle, object: RawHandle) {
        self.bindings
            .FPDFPage_InsertObject(page.as_ptr(), object.as_ptr());
    }

    fn destroy_page_object(&mut self, object: RawHandle) {
        self.bindings.FPDFPageObj_Destroy(object.as_ptr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        assert_eq!(PdfiumConfig::new().dir(), None);
        let config = PdfiumConfig::new().library_dir("/opt/pdfium/lib");
        assert_eq!(config.dir(), Some(Path::new("/opt/pdfium/lib")));
    }

    #[test]
    fn test_form_info_version_one_tried_first() {
        assert_eq!(FORM_INFO_VERSIONS.first(), Some(&1));
        assert!(FORM_INFO_VERSIONS.contains(&2));
    }

    #[test]
    fn test_slice_reader_bounds() {
        let data = [1u8, 2, 3, 4];
        let reader = SliceReader { data: &data };
        let param = &reader as *const SliceReader<'_> as *mut c_void;
        let mut out = [0u8; 2];
        unsafe {
            assert_eq!(read_block(param, 1, out.as_mut_ptr(), 2), 1);
            assert_eq!(out, [2, 3]);
            assert_eq!(read_block(param, 3, out.as_mut_ptr(), 2), 0);
        }
    }
}
