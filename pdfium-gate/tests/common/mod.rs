//! Shared fixtures for the integration tests

#![allow(dead_code)]

use pdfium_gate::backend::memory::{EngineProbe, MemoryDocument, MemoryEngine, MemoryPage};
use pdfium_gate::{Library, ScalingPolicy};

pub const PASSWORD: &str = "s3cret";

/// A live library over a fresh memory engine, plus its probe.
pub fn init() -> (Library, EngineProbe) {
    let engine = MemoryEngine::new();
    let probe = engine.probe();
    let library = Library::init(engine).expect("library should initialize");
    (library, probe)
}

/// 19 pages of 595x841 points labelled `a-1` to `a-19`, version 1.7.
pub fn nineteen_pages() -> Vec<u8> {
    MemoryDocument::new()
        .pages("a", 19, 595.0, 841.0)
        .to_bytes()
}

/// 5 letter-sized pages labelled `b-1` to `b-5`.
pub fn five_pages() -> Vec<u8> {
    MemoryDocument::new()
        .pages("b", 5, 612.0, 792.0)
        .to_bytes()
}

/// 3 pages behind [`PASSWORD`].
pub fn protected() -> Vec<u8> {
    MemoryDocument::new()
        .password(PASSWORD)
        .pages("p", 3, 595.0, 842.0)
        .to_bytes()
}

/// A single page built by the caller.
pub fn single_page(page: MemoryPage) -> Vec<u8> {
    MemoryDocument::new().page(page).to_bytes()
}

pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    MemoryDocument::from_bytes(bytes)
        .expect("output should be a memory document")
        .pages
        .into_iter()
        .map(|page| page.label)
        .collect()
}

pub fn native() -> ScalingPolicy {
    ScalingPolicy::default()
}
