//! Document sessions

use crate::engine::{DocumentSource, Matrix, SaveMode};
use crate::error::{PdfError, Result};
use crate::handle::{HandleId, HandleKind};
use crate::library::Library;
use crate::page::PageSession;
use crate::page_range::PageRange;
use crate::scaling::ScalingPolicy;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// PDF file format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PdfVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
    V1_4,
    V1_5,
    V1_6,
    V1_7,
    V2_0,
}

impl PdfVersion {
    /// Version as the engine numbers it: `17` for 1.7.
    pub fn number(self) -> i32 {
        match self {
            PdfVersion::V1_0 => 10,
            PdfVersion::V1_1 => 11,
            PdfVersion::V1_2 => 12,
            PdfVersion::V1_3 => 13,
            PdfVersion::V1_4 => 14,
            PdfVersion::V1_5 => 15,
            PdfVersion::V1_6 => 16,
            PdfVersion::V1_7 => 17,
            PdfVersion::V2_0 => 20,
        }
    }
}

impl TryFrom<i32> for PdfVersion {
    type Error = PdfError;

    fn try_from(number: i32) -> Result<Self> {
        Ok(match number {
            10 => PdfVersion::V1_0,
            11 => PdfVersion::V1_1,
            12 => PdfVersion::V1_2,
            13 => PdfVersion::V1_3,
            14 => PdfVersion::V1_4,
            15 => PdfVersion::V1_5,
            16 => PdfVersion::V1_6,
            17 => PdfVersion::V1_7,
            20 => PdfVersion::V2_0,
            other => return Err(PdfError::UnsupportedVersion(other)),
        })
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = self.number();
        write!(f, "{}.{}", number / 10, number % 10)
    }
}

/// A JPEG image to place on its own page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegImage {
    pub bytes: Vec<u8>,
    /// Page width in points.
    pub width: u32,
    /// Page height in points.
    pub height: u32,
}

impl JpegImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if bytes.is_empty() {
            return Err(PdfError::invalid("bytes", "buffer can't be empty"));
        }
        if width == 0 {
            return Err(PdfError::invalid("width", "value can't be less or equal to zero"));
        }
        if height == 0 {
            return Err(PdfError::invalid(
                "height",
                "value can't be less or equal to zero",
            ));
        }
        Ok(Self {
            bytes,
            width,
            height,
        })
    }

    /// Whether the bytes start with a JPEG start-of-image marker.
    pub fn looks_like_jpeg(&self) -> bool {
        self.bytes.starts_with(&[0xFF, 0xD8, 0xFF])
    }
}

/// An open document.
///
/// Every method takes the engine gate for the duration of its native calls.
/// After [`close`](DocumentSession::close) all methods fail with
/// [`PdfError::SessionDisposed`].
pub struct DocumentSession {
    library: Library,
    handle: HandleId,
    form: Option<HandleId>,
    dimensions: ScalingPolicy,
    // The engine may read lazily from the buffer; freed only after `handle`.
    source: Mutex<Option<Box<[u8]>>>,
    disposed: AtomicBool,
}

impl DocumentSession {
    pub(crate) fn open(
        library: Library,
        source: DocumentSource<'_>,
        password: Option<&str>,
        dimensions: ScalingPolicy,
    ) -> Result<Self> {
        let password = password.filter(|p| !p.is_empty());
        let (handle, form) = library.gate().with_engine(|state| {
            let root = state.root();
            let mut scope = state.scope();
            let Some(document) = scope.acquire(HandleKind::Document, root, |engine| {
                engine.load_document(source, password)
            })?
            else {
                let code = scope.engine().last_error();
                return Err(PdfError::LoadFailed { code });
            };
            let raw = scope.raw(document)?;
            let form = scope.acquire(HandleKind::FormEnvironment, document, |engine| {
                engine.init_form_environment(raw)
            })?;

            scope.keep(document);
            if let Some(form) = form {
                scope.keep(form);
            }
            Ok((document, form))
        })?;

        log::debug!("opened document {:?}", handle);
        Ok(Self {
            library,
            handle,
            form,
            dimensions,
            source: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn open_owned(
        library: Library,
        bytes: Box<[u8]>,
        password: Option<&str>,
        dimensions: ScalingPolicy,
    ) -> Result<Self> {
        let session = Self::open(library, DocumentSource::Bytes(&bytes), password, dimensions)?;
        *session.source_slot() = Some(bytes);
        Ok(session)
    }

    pub(crate) fn create(library: Library, dimensions: ScalingPolicy) -> Result<Self> {
        let handle = library.gate().with_engine(|state| {
            let root = state.root();
            let mut scope = state.scope();
            let Some(document) =
                scope.acquire(HandleKind::Document, root, |engine| engine.create_document())?
            else {
                let code = scope.engine().last_error();
                return Err(PdfError::LoadFailed { code });
            };
            scope.keep(document);
            Ok(document)
        })?;

        Ok(Self {
            library,
            handle,
            form: None,
            dimensions,
            source: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(PdfError::SessionDisposed);
        }
        Ok(())
    }

    pub(crate) fn library(&self) -> &Library {
        &self.library
    }

    pub(crate) fn handle(&self) -> HandleId {
        self.handle
    }

    pub(crate) fn form(&self) -> Option<HandleId> {
        self.form
    }

    pub fn dimensions(&self) -> ScalingPolicy {
        self.dimensions
    }

    pub fn is_closed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn page_count(&self) -> Result<usize> {
        self.check()?;
        self.library.gate().with_engine(|state| {
            let raw = state.raw(self.handle)?;
            Ok(state.engine().page_count(raw).max(0) as usize)
        })
    }

    /// File format version.
    ///
    /// Fails with [`PdfError::VersionUnavailable`] for documents without one
    /// (newly created documents) and [`PdfError::UnsupportedVersion`] for
    /// numbers outside the known set.
    pub fn version(&self) -> Result<PdfVersion> {
        self.check()?;
        let number = self.library.gate().with_engine(|state| {
            let raw = state.raw(self.handle)?;
            Ok(state.engine().file_version(raw))
        })?;
        PdfVersion::try_from(number.ok_or(PdfError::VersionUnavailable)?)
    }

    /// Open page `index` (0-based).
    pub fn open_page(&self, index: usize) -> Result<PageSession<'_>> {
        PageSession::open(self, index)
    }

    /// Import pages of `source` before page `insert_at` of this document.
    ///
    /// `range` is 1-based; `None` imports every page. Returns the engine's
    /// verdict: `false` if it rejected the range or the import. Both
    /// documents must come from the same [`Library`] instance.
    pub fn import_pages_from(
        &self,
        source: &DocumentSession,
        range: Option<&PageRange>,
        insert_at: usize,
    ) -> Result<bool> {
        self.check()?;
        source.check()?;
        // Handle ids are only meaningful inside the arena that issued them.
        if !self.library.is_same(&source.library) {
            return Err(PdfError::invalid(
                "source",
                "document belongs to a different library instance",
            ));
        }
        let range = range.map(PageRange::to_engine_string);
        let insert_at = i32::try_from(insert_at)
            .map_err(|_| PdfError::invalid("insert_at", "index is out of range"))?;
        self.library.gate().with_engine(|state| {
            let dest = state.raw(self.handle)?;
            let src = state.raw(source.handle)?;
            Ok(state
                .engine()
                .import_pages(dest, src, range.as_deref(), insert_at))
        })
    }

    /// Serialize the document.
    pub fn save_to_bytes(&self, mode: SaveMode) -> Result<Vec<u8>> {
        self.check()?;
        self.library.gate().with_engine(|state| {
            let raw = state.raw(self.handle)?;
            state
                .engine()
                .save_as_copy(raw, mode)
                .ok_or_else(|| PdfError::SaveFailed {
                    reason: "engine refused to save the document".to_string(),
                })
        })
    }

    /// Append a page the size of `image` showing it.
    ///
    /// Bytes that are not JPEG are handed to the engine anyway and produce an
    /// empty image, not an error.
    pub fn append_jpeg_page(&self, image: &JpegImage) -> Result<()> {
        self.check()?;
        if !image.looks_like_jpeg() {
            log::warn!("image bytes do not start with a JPEG marker; the page image will be empty");
        }
        let width = f64::from(image.width);
        let height = f64::from(image.height);

        self.library.gate().with_engine(|state| {
            let doc = state.raw(self.handle)?;
            let at = state.engine().page_count(doc).max(0);
            let mut scope = state.scope();

            let page = scope
                .acquire(HandleKind::Page, self.handle, |engine| {
                    engine.new_page(doc, at, width, height)
                })?
                .ok_or_else(|| image_error(at, "engine could not create a page"))?;
            let page_raw = scope.raw(page)?;
            let object = scope
                .acquire(HandleKind::PageObject, page, |engine| engine.new_image_object(doc))?
                .ok_or_else(|| image_error(at, "engine could not create an image object"))?;
            let object_raw = scope.raw(object)?;

            if !scope.engine().load_jpeg_inline(page_raw, object_raw, &image.bytes) {
                log::warn!("engine did not accept JPEG data for page {}", at);
            }
            let matrix = Matrix::new(width, 0.0, 0.0, height, 0.0, 0.0);
            if !scope.engine().set_image_matrix(object_raw, &matrix) {
                return Err(image_error(at, "engine could not place the image"));
            }

            scope.engine().insert_page_object(page_raw, object_raw);
            scope.transfer(object);
            if !scope.engine().generate_content(page_raw) {
                return Err(image_error(at, "engine could not generate page content"));
            }
            // Dropping the scope closes the page.
            Ok(())
        })
    }

    /// Release the document handle, then its source buffer. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let released = self
            .library
            .gate()
            .with_state(|state| Ok(state.release(self.handle)));
        match released {
            Ok(count) => {
                log::debug!("closed document {:?} ({} handle(s))", self.handle, count);
                self.source_slot().take();
                Ok(())
            }
            Err(e) => {
                self.disposed.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn source_slot(&self) -> std::sync::MutexGuard<'_, Option<Box<[u8]>>> {
        self.source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close document {:?}: {}", self.handle, e);
            // The handle may still read from the buffer; never free it first.
            if let Some(buffer) = self.source_slot().take() {
                std::mem::forget(buffer);
            }
        }
    }
}

impl fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSession")
            .field("handle", &self.handle)
            .field("dimensions", &self.dimensions)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn image_error(index: i32, reason: &str) -> PdfError {
    PdfError::ImageImportFailed {
        index: index.max(0) as usize,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_known_set() {
        let version = PdfVersion::try_from(17).unwrap();
        assert_eq!(version, PdfVersion::V1_7);
        assert_eq!(version.to_string(), "1.7");
        assert_eq!(PdfVersion::V2_0.to_string(), "2.0");
        assert_eq!(PdfVersion::V1_0.number(), 10);
    }

    #[test]
    fn test_version_rejects_unknown_numbers() {
        for number in [0, 9, 18, 19, 21, -17, 99] {
            assert!(matches!(
                PdfVersion::try_from(number),
                Err(PdfError::UnsupportedVersion(n)) if n == number
            ));
        }
    }

    #[test]
    fn test_jpeg_image_validation() {
        assert!(JpegImage::new(vec![], 10, 10).is_err());
        assert!(JpegImage::new(vec![1], 0, 10).is_err());
        assert!(JpegImage::new(vec![1], 10, 0).is_err());
        let image = JpegImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0], 10, 10).unwrap();
        assert!(image.looks_like_jpeg());
        assert!(!JpegImage::new(vec![0x89, b'P'], 1, 1).unwrap().looks_like_jpeg());
    }
}
