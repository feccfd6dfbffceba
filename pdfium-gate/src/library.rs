//! Library lifetime and entry point

use crate::document::DocumentSession;
use crate::editor::EditorEngine;
use crate::engine::{DocumentSource, NativeEngine};
use crate::error::{LastError, PdfError, Result};
use crate::gate::{EngineState, GlobalEngineGate};
use crate::scaling::ScalingPolicy;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "pdfium")]
use crate::backend::pdfium::{PdfiumConfig, PdfiumEngine};

/// Set while a [`Library`] is live anywhere in the process.
static LIBRARY_LIVE: AtomicBool = AtomicBool::new(false);

/// Owner of the native library and its gate.
///
/// Only one library can be live per process. Create it once with
/// [`Library::init`], share it by cloning (clones are cheap and refer to the
/// same engine), and tear it down with [`Library::shutdown`] or by dropping
/// the last clone. A new library may be initialized after shutdown.
///
/// # Example
///
/// ```
/// use pdfium_gate::{Library, ScalingPolicy};
/// use pdfium_gate::backend::memory::{MemoryDocument, MemoryEngine};
///
/// let library = Library::init(MemoryEngine::new())?;
/// let bytes = MemoryDocument::new().pages("page", 3, 595.0, 842.0).to_bytes();
///
/// let doc = library.load_document_from_bytes(bytes, None, ScalingPolicy::viewport(1080, 1920)?)?;
/// assert_eq!(doc.page_count()?, 3);
/// assert_eq!(doc.version()?.to_string(), "1.7");
///
/// doc.close()?;
/// library.shutdown()?;
/// # Ok::<(), pdfium_gate::PdfError>(())
/// ```
#[derive(Clone)]
pub struct Library {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    gate: GlobalEngineGate,
}

impl Library {
    /// Initialize the library around `engine`.
    ///
    /// Fails with [`PdfError::AlreadyInitialized`] while another library is live.
    pub fn init<E>(engine: E) -> Result<Self>
    where
        E: NativeEngine + 'static,
    {
        if LIBRARY_LIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PdfError::AlreadyInitialized);
        }

        let gate = GlobalEngineGate::open(Box::new(engine));
        log::debug!("PDF library initialized");
        Ok(Self {
            inner: Arc::new(LibraryInner { gate }),
        })
    }

    /// Bind the PDFium shared library described by `config` and initialize it.
    #[cfg(feature = "pdfium")]
    pub fn init_pdfium(config: &PdfiumConfig) -> Result<Self> {
        Self::init(PdfiumEngine::bind(config)?)
    }

    /// Release every live handle, then the library itself. Idempotent.
    ///
    /// Sessions still open afterwards fail with [`PdfError::LibraryShutDown`];
    /// closing them remains safe.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .gate
            .with_state(|state| Ok(state.is_active()))
            .unwrap_or(false)
    }

    /// Open a PDF file.
    ///
    /// An empty password is the same as none.
    pub fn load_document_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        password: Option<&str>,
        dimensions: ScalingPolicy,
    ) -> Result<DocumentSession> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PdfError::invalid("path", "file path can't be empty"));
        }
        DocumentSession::open(
            self.clone(),
            DocumentSource::Path(path),
            password,
            dimensions,
        )
    }

    /// Open a PDF held in memory. The session owns the buffer until it is closed.
    pub fn load_document_from_bytes<B: Into<Vec<u8>>>(
        &self,
        bytes: B,
        password: Option<&str>,
        dimensions: ScalingPolicy,
    ) -> Result<DocumentSession> {
        let bytes: Box<[u8]> = bytes.into().into_boxed_slice();
        if bytes.is_empty() {
            return Err(PdfError::invalid("bytes", "buffer can't be empty"));
        }
        DocumentSession::open_owned(self.clone(), bytes, password, dimensions)
    }

    /// Create an empty document.
    pub fn create_document(&self) -> Result<DocumentSession> {
        DocumentSession::create(self.clone(), ScalingPolicy::default())
    }

    /// Merge, split, unlock and image-to-PDF operations.
    pub fn editor(&self) -> EditorEngine {
        EditorEngine::new(self.clone())
    }

    /// The engine's last-error side channel.
    pub fn last_error(&self) -> Result<LastError> {
        self.inner.gate.with_engine(|state| {
            Ok(LastError {
                code: state.engine().last_error(),
            })
        })
    }

    /// Native handles currently owned by sessions.
    pub fn live_handle_count(&self) -> Result<usize> {
        self.inner
            .gate
            .with_state(|state| Ok(state.live_handle_count()))
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineState) -> Result<T>,
    {
        self.inner.gate.with_engine(f)
    }

    pub(crate) fn gate(&self) -> &GlobalEngineGate {
        &self.inner.gate
    }

    /// Whether `other` is a clone of this library rather than a later instance.
    pub(crate) fn is_same(&self, other: &Library) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl LibraryInner {
    fn shutdown(&self) -> Result<()> {
        if self.gate.shutdown()? {
            LIBRARY_LIVE.store(false, Ordering::SeqCst);
            log::debug!("PDF library shut down");
        }
        Ok(())
    }
}

impl Drop for LibraryInner {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("failed to shut down PDF library: {}", e);
        }
    }
}
