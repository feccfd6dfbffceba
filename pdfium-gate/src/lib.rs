//! # pdfium-gate
//!
//! Safe, thread-safe access to a non-reentrant PDF engine such as PDFium.
//!
//! The engine may be called from any thread but never from two at once, and
//! its handles form a tree (library, document, page, text page, bitmap) that
//! must be released child-first. This crate provides:
//!
//! - **One process-wide gate** serializing every native call
//! - **A handle arena** that releases every handle exactly once, children first
//! - **Document and page sessions** that refuse use after close
//! - **Scaling and coordinate mapping** from page space to pixels
//! - **Merge, split, unlock and JPEG-to-PDF** on top of the above
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "pdfium")]
//! # fn main() -> pdfium_gate::Result<()> {
//! use pdfium_gate::{Library, PdfiumConfig, RenderFlags, ScalingPolicy};
//!
//! let library = Library::init_pdfium(&PdfiumConfig::from_env())?;
//! let doc = library.load_document_from_file(
//!     "document.pdf",
//!     None,
//!     ScalingPolicy::viewport(1080, 1920)?,
//! )?;
//!
//! for index in 0..doc.page_count()? {
//!     let page = doc.open_page(index)?;
//!     println!("{}", page.text()?);
//!     let bgra = page.image(RenderFlags::RENDER_ANNOTATIONS)?;
//!     println!("{}x{}: {} bytes", page.width()?, page.height()?, bgra.len());
//! }
//!
//! let first_seven = library.editor().split_str(&std::fs::read("document.pdf")?, "1-7")?;
//! # let _ = first_seven;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "pdfium"))]
//! # fn main() {}
//! ```
//!
//! Without the `pdfium` feature, [`backend::memory::MemoryEngine`] stands in
//! for the native library.

mod annotation;
mod convert;
mod coords;
mod document;
mod editor;
mod engine;
mod error;
mod gate;
mod handle;
mod library;
mod page;
mod page_range;
mod scaling;
mod text;

pub mod backend;

pub use annotation::{ActionType, AnnotationSubtype, UriAnnotation};
pub use convert::{ImageBytesConverter, NaiveTransparencyRemover};
pub use coords::{BoundBox, CoordinateMapper, DevicePoint, PageRect, PageRotation};
pub use document::{DocumentSession, JpegImage, PdfVersion};
pub use editor::EditorEngine;
pub use engine::{DocumentSource, Matrix, NativeEngine, RawHandle, SaveMode};
pub use error::{
    error_code_phrase, DocumentLoadFailure, LastError, PdfError, Result, ERROR_PASSWORD,
};
pub use gate::{gate_held_by_current_thread, EngineState, GlobalEngineGate};
pub use handle::{HandleArena, HandleId, HandleKind, HandleScope};
pub use library::Library;
pub use page::{Characters, PageSession, RenderFlags};
pub use page_range::{PageIndexRange, PageRange, SubRange};
pub use scaling::ScalingPolicy;
pub use text::{Character, FontInfo, TextRenderMode};

#[cfg(feature = "pdfium")]
pub use backend::pdfium::{PdfiumConfig, PdfiumEngine};
