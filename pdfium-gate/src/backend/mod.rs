//! Engine implementations
//!
//! [`memory::MemoryEngine`] simulates documents in process and is always
//! available. [`pdfium::PdfiumEngine`] binds the PDFium shared library at
//! runtime and needs the `pdfium` feature.

pub mod memory;

#[cfg(feature = "pdfium")]
pub mod pdfium;
