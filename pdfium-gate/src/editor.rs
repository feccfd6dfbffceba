//! Document editing: merge, split, unlock and JPEG-to-PDF
//!
//! Every operation opens its inputs as [`DocumentSession`]s and composes the
//! leaf calls on them. Each leaf call takes the engine gate on its own, so an
//! operation never holds the gate across another public entry point.
//! Intermediate sessions are closed on every exit path.

use crate::document::{DocumentSession, JpegImage};
use crate::engine::SaveMode;
use crate::error::{DocumentLoadFailure, PdfError, Result};
use crate::library::Library;
use crate::page_range::{PageIndexRange, PageRange};
use crate::scaling::ScalingPolicy;
use std::path::Path;

/// Multi-document operations on a [`Library`].
///
/// Obtained from [`Library::editor`]. Inputs are complete PDF files held in
/// memory or, for the `*_file` variants, read from disk. Outputs are always
/// in memory.
#[derive(Clone)]
pub struct EditorEngine {
    library: Library,
}

impl EditorEngine {
    pub(crate) fn new(library: Library) -> Self {
        Self { library }
    }

    /// Append every page of each of `others` to `primary`, in order.
    ///
    /// All inputs are opened before anything is imported. If any fail to
    /// load, the error lists each failing input: index 0 is `primary`, then
    /// `others` in order.
    pub fn merge(&self, primary: &[u8], others: &[&[u8]]) -> Result<Vec<u8>> {
        let inputs: Vec<&[u8]> = std::iter::once(primary)
            .chain(others.iter().copied())
            .collect();
        let sessions = self.open_all(&inputs, |bytes| self.open(bytes, None))?;
        Self::merge_sessions(sessions)
    }

    /// [`merge`](Self::merge) for PDF files on disk.
    pub fn merge_files<P: AsRef<Path>>(&self, primary: P, others: &[P]) -> Result<Vec<u8>> {
        let paths: Vec<&Path> = std::iter::once(primary.as_ref())
            .chain(others.iter().map(|path| path.as_ref()))
            .collect();
        let sessions = self.open_all(&paths, |path| self.open_file(path, None))?;
        Self::merge_sessions(sessions)
    }

    /// Copy the pages selected by `range` into a new document.
    ///
    /// Pages land in the order the range lists them.
    pub fn split(&self, source: &[u8], range: &PageRange) -> Result<Vec<u8>> {
        let source = self.open(source, None)?;
        self.split_session(source, range)
    }

    /// [`split`](Self::split) for a PDF file on disk.
    pub fn split_file<P: AsRef<Path>>(&self, path: P, range: &PageRange) -> Result<Vec<u8>> {
        let source = self.open_file(path.as_ref(), None)?;
        self.split_session(source, range)
    }

    /// [`split`](Self::split) with a range expression such as `"1-7,12,14-18"`.
    pub fn split_str(&self, source: &[u8], range: &str) -> Result<Vec<u8>> {
        let range = PageRange::parse(range)?;
        self.split(source, &range)
    }

    /// [`split`](Self::split) with 0-based inclusive page indices.
    pub fn split_indices(&self, source: &[u8], from_index: i32, to_index: i32) -> Result<Vec<u8>> {
        let range = PageIndexRange::new(from_index, to_index)?.to_page_range();
        self.split(source, &range)
    }

    /// Re-save `source` without its security handler.
    ///
    /// A wrong password fails with [`PdfError::LoadFailed`] carrying code 4.
    pub fn unlock(&self, source: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
        Self::save_unlocked(self.open(source, password)?)
    }

    /// [`unlock`](Self::unlock) for a PDF file on disk.
    pub fn unlock_file<P: AsRef<Path>>(&self, path: P, password: Option<&str>) -> Result<Vec<u8>> {
        Self::save_unlocked(self.open_file(path.as_ref(), password)?)
    }

    /// Build a document with one page per image, each page the image's size.
    ///
    /// Bytes that are not JPEG are passed to the engine unchanged; they give
    /// an empty image on the page rather than an error.
    pub fn jpeg_to_pdf(&self, images: &[JpegImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(PdfError::invalid("images", "at least one image is required"));
        }

        let document = self.library.create_document()?;
        for image in images {
            document.append_jpeg_page(image)?;
        }
        let bytes = document.save_to_bytes(SaveMode::NoIncremental)?;
        document.close()?;
        Ok(bytes)
    }

    fn merge_sessions(mut sessions: Vec<DocumentSession>) -> Result<Vec<u8>> {
        let target = sessions.remove(0);

        for (offset, source) in sessions.iter().enumerate() {
            let document_index = offset + 1;
            let at = target.page_count()?;
            log::debug!("merging document {} at page {}", document_index, at);
            if !target.import_pages_from(source, None, at)? {
                return Err(PdfError::MergeFailed {
                    document_index,
                    reason: "engine rejected the page import".to_string(),
                });
            }
        }

        let bytes = target.save_to_bytes(SaveMode::NoIncremental)?;
        for session in &sessions {
            session.close()?;
        }
        target.close()?;
        Ok(bytes)
    }

    fn split_session(&self, source: DocumentSession, range: &PageRange) -> Result<Vec<u8>> {
        let count = source.page_count()?;
        let max_page = range.max_page() as usize;
        if max_page > count {
            return Err(PdfError::SplitFailed {
                range: range.to_string(),
                reason: format!(
                    "page {} is out of range for a document of {} pages",
                    max_page, count
                ),
            });
        }

        let target = self.library.create_document()?;
        log::debug!("splitting pages {} of {}", range, count);
        if !target.import_pages_from(&source, Some(range), 0)? {
            return Err(PdfError::SplitFailed {
                range: range.to_string(),
                reason: "engine rejected the page import".to_string(),
            });
        }

        let bytes = target.save_to_bytes(SaveMode::NoIncremental)?;
        target.close()?;
        source.close()?;
        Ok(bytes)
    }

    fn save_unlocked(document: DocumentSession) -> Result<Vec<u8>> {
        let bytes = document.save_to_bytes(SaveMode::RemoveSecurity)?;
        document.close()?;
        Ok(bytes)
    }

    fn open(&self, bytes: &[u8], password: Option<&str>) -> Result<DocumentSession> {
        self.library
            .load_document_from_bytes(bytes, password, ScalingPolicy::default())
    }

    fn open_file(&self, path: &Path, password: Option<&str>) -> Result<DocumentSession> {
        self.library
            .load_document_from_file(path, password, ScalingPolicy::default())
    }

    /// Open every input, collecting load failures instead of stopping at the first.
    fn open_all<T, F>(&self, inputs: &[T], open: F) -> Result<Vec<DocumentSession>>
    where
        F: Fn(&T) -> Result<DocumentSession>,
    {
        let mut sessions = Vec::with_capacity(inputs.len());
        let mut failures = Vec::new();

        for (index, input) in inputs.iter().enumerate() {
            match open(input) {
                Ok(session) => sessions.push(session),
                Err(PdfError::LoadFailed { code }) => {
                    log::debug!("document {} failed to load with code {}", index, code);
                    failures.push(DocumentLoadFailure { index, code });
                }
                Err(e) => return Err(e),
            }
        }

        if failures.is_empty() {
            Ok(sessions)
        } else {
            Err(PdfError::LoadDocumentsFailed {
                failures,
                total: inputs.len(),
            })
        }
    }
}
