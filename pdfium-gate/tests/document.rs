//! Document sessions: loading, metadata, disposal and error codes

mod common;

use common::{init, native, nineteen_pages, protected, PASSWORD};
use pdfium_gate::backend::memory::MemoryDocument;
use pdfium_gate::{PageRange, PdfError, PdfVersion, SaveMode, ScalingPolicy, ERROR_PASSWORD};
use serial_test::serial;
use std::io::Write;

// ============================================================================
// Loading
// ============================================================================

#[test]
#[serial]
fn test_nineteen_page_scenario() {
    let (library, _probe) = init();
    let bytes = nineteen_pages();

    let doc = library
        .load_document_from_bytes(bytes.clone(), None, ScalingPolicy::viewport(10, 10).unwrap())
        .unwrap();
    assert_eq!(doc.page_count().unwrap(), 19);
    assert_eq!(doc.version().unwrap(), PdfVersion::V1_7);
    assert_eq!(doc.version().unwrap().to_string(), "1.7");
    doc.close().unwrap();

    let doc = library
        .load_document_from_bytes(bytes, None, ScalingPolicy::scale(2.0).unwrap())
        .unwrap();
    let page = doc.open_page(0).unwrap();
    assert_eq!(page.width().unwrap(), 1190);
    assert_eq!(page.height().unwrap(), 1682);
}

#[test]
#[serial]
fn test_load_from_file() {
    let (library, _probe) = init();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&nineteen_pages()).unwrap();

    let doc = library
        .load_document_from_file(file.path(), None, native())
        .unwrap();
    assert_eq!(doc.page_count().unwrap(), 19);
}

#[test]
#[serial]
fn test_missing_file_reports_code_2() {
    let (library, _probe) = init();
    let dir = tempfile::tempdir().unwrap();
    let result = library.load_document_from_file(dir.path().join("absent.pdf"), None, native());

    let err = result.unwrap_err();
    assert_eq!(err.native_code(), Some(2));
    assert!(err.to_string().contains("file not found or could not be opened"));
}

#[test]
#[serial]
fn test_empty_inputs_rejected_before_engine() {
    let (library, probe) = init();
    let calls = probe.calls();

    let result = library.load_document_from_bytes(Vec::new(), None, native());
    assert!(matches!(result, Err(PdfError::InvalidArgument { name: "bytes", .. })));
    let result = library.load_document_from_file("", None, native());
    assert!(matches!(result, Err(PdfError::InvalidArgument { name: "path", .. })));

    assert_eq!(probe.calls(), calls);
}

#[test]
#[serial]
fn test_password_handling() {
    let (library, _probe) = init();

    let missing = library.load_document_from_bytes(protected(), None, native());
    assert!(matches!(missing, Err(PdfError::LoadFailed { code }) if code == ERROR_PASSWORD));

    let wrong = library.load_document_from_bytes(protected(), Some("nope"), native());
    assert!(matches!(wrong, Err(PdfError::LoadFailed { code: 4 })));

    // An empty password is the same as none.
    let empty = library.load_document_from_bytes(protected(), Some(""), native());
    assert!(matches!(empty, Err(PdfError::LoadFailed { code: 4 })));

    let doc = library
        .load_document_from_bytes(protected(), Some(PASSWORD), native())
        .unwrap();
    assert_eq!(doc.page_count().unwrap(), 3);
}

#[test]
#[serial]
fn test_failed_load_leaves_no_handles() {
    let (library, probe) = init();
    let _ = library.load_document_from_bytes(b"garbage".to_vec(), None, native());
    assert_eq!(library.live_handle_count().unwrap(), 0);
    assert_eq!(probe.live_handles(), 0);
}

// ============================================================================
// Version
// ============================================================================

#[test]
#[serial]
fn test_version_outside_known_set() {
    let (library, _probe) = init();
    let bytes = MemoryDocument::new()
        .version(Some(18))
        .pages("v", 1, 100.0, 100.0)
        .to_bytes();
    let doc = library.load_document_from_bytes(bytes, None, native()).unwrap();
    assert!(matches!(doc.version(), Err(PdfError::UnsupportedVersion(18))));
}

#[test]
#[serial]
fn test_new_document_has_no_version() {
    let (library, _probe) = init();
    let doc = library.create_document().unwrap();
    assert_eq!(doc.page_count().unwrap(), 0);
    assert!(matches!(doc.version(), Err(PdfError::VersionUnavailable)));
}

// ============================================================================
// Pages
// ============================================================================

#[test]
#[serial]
fn test_open_page_out_of_range() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let live = probe.live_handles();

    let result = doc.open_page(19);
    assert!(matches!(
        result,
        Err(PdfError::PageOpenFailed { index: 19, count: 19 })
    ));
    assert_eq!(probe.live_handles(), live);
}

#[test]
#[serial]
fn test_page_text_failure_releases_page() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let live = probe.live_handles();
    probe.set_fail_text_load(true);

    let result = doc.open_page(3);
    assert!(matches!(result, Err(PdfError::PageTextOpenFailed { index: 3 })));
    assert_eq!(probe.live_handles(), live);
    assert_eq!(probe.invalid_releases(), 0);
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
#[serial]
fn test_close_twice_is_harmless() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    doc.close().unwrap();
    doc.close().unwrap();
    drop(doc);
    assert_eq!(probe.invalid_releases(), 0);
    assert_eq!(library.live_handle_count().unwrap(), 0);

    // Unrelated sessions keep working.
    let other = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    assert_eq!(other.page_count().unwrap(), 19);
}

#[test]
#[serial]
fn test_use_after_close_fails() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    doc.close().unwrap();
    let calls = probe.calls();

    assert!(doc.is_closed());
    assert!(matches!(doc.page_count(), Err(PdfError::SessionDisposed)));
    assert!(matches!(doc.version(), Err(PdfError::SessionDisposed)));
    assert!(matches!(doc.open_page(0), Err(PdfError::SessionDisposed)));
    assert!(matches!(
        doc.save_to_bytes(SaveMode::NoIncremental),
        Err(PdfError::SessionDisposed)
    ));
    assert_eq!(probe.calls(), calls);
}

#[test]
#[serial]
fn test_closing_document_releases_open_pages() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();
    doc.close().unwrap();

    assert_eq!(probe.live_handles(), 0);
    assert!(matches!(page.text(), Err(PdfError::SessionDisposed)));
    drop(page);
    assert_eq!(probe.invalid_releases(), 0);
}

#[test]
#[serial]
fn test_save_round_trip() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let saved = doc.save_to_bytes(SaveMode::NoIncremental).unwrap();
    let reopened = library.load_document_from_bytes(saved, None, native()).unwrap();
    assert_eq!(reopened.page_count().unwrap(), 19);
}

#[test]
#[serial]
fn test_save_failure() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    probe.set_fail_save(true);
    assert!(matches!(
        doc.save_to_bytes(SaveMode::Incremental),
        Err(PdfError::SaveFailed { .. })
    ));
}

// ============================================================================
// Import
// ============================================================================

#[test]
#[serial]
fn test_import_within_library() {
    let (library, _probe) = init();
    let source = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let target = library.create_document().unwrap();
    let range = PageRange::parse("2-3").unwrap();

    assert!(target.import_pages_from(&source, Some(&range), 0).unwrap());
    assert_eq!(target.page_count().unwrap(), 2);
}

#[test]
#[serial]
fn test_import_rejects_document_of_earlier_library() {
    let (first, _) = init();
    let stale = first
        .load_document_from_bytes(
            MemoryDocument::new().pages("old", 3, 595.0, 842.0).to_bytes(),
            None,
            native(),
        )
        .unwrap();
    first.shutdown().unwrap();

    // The new arena hands out the same ids as the old one did.
    let (second, probe) = init();
    let _source = second
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let target = second.create_document().unwrap();
    let calls = probe.calls();

    assert!(matches!(
        target.import_pages_from(&stale, None, 0),
        Err(PdfError::InvalidArgument { name: "source", .. })
    ));
    assert_eq!(probe.calls(), calls);
    assert_eq!(target.page_count().unwrap(), 0);
    assert!(matches!(stale.page_count(), Err(PdfError::LibraryShutDown)));
}
