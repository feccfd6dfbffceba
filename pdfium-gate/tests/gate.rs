//! Gate discipline under concurrent callers

mod common;

use common::{five_pages, init, native, nineteen_pages};
use pdfium_gate::{gate_held_by_current_thread, PdfError, RenderFlags};
use rayon::prelude::*;
use serial_test::serial;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

#[test]
#[serial]
fn test_native_calls_never_overlap() {
    let (library, probe) = init();
    probe.set_call_delay(Duration::from_micros(50));
    let bytes = nineteen_pages();

    let totals: Vec<usize> = (0..16)
        .into_par_iter()
        .map(|i| {
            let doc = library
                .load_document_from_bytes(bytes.clone(), None, native())
                .unwrap();
            let page = doc.open_page(i % 19).unwrap();
            let pixels = page.image(RenderFlags::NONE).unwrap();
            let text = page.text().unwrap();
            pixels.len() + text.len() + doc.page_count().unwrap()
        })
        .collect();

    assert_eq!(totals.len(), 16);
    assert_eq!(probe.max_in_flight(), 1);
    assert_eq!(probe.live_handles(), 0);
}

#[test]
#[serial]
fn test_shared_document_across_threads() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(five_pages(), None, native())
        .unwrap();

    let widths: Vec<u32> = (0..5)
        .into_par_iter()
        .map(|i| doc.open_page(i).unwrap().width().unwrap())
        .collect();

    assert_eq!(widths, vec![612; 5]);
    assert_eq!(probe.max_in_flight(), 1);
}

#[test]
#[serial]
fn test_editor_runs_alongside_readers() {
    let (library, probe) = init();
    let source = nineteen_pages();

    let (split, count) = rayon::join(
        || library.editor().split_str(&source, "1-3").unwrap(),
        || {
            let doc = library
                .load_document_from_bytes(source.clone(), None, native())
                .unwrap();
            doc.page_count().unwrap()
        },
    );

    assert!(!split.is_empty());
    assert_eq!(count, 19);
    assert_eq!(probe.max_in_flight(), 1);
}

#[test]
#[serial]
fn test_reentry_fails_fast() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();

    let nested = library.with_engine(|_| {
        assert!(gate_held_by_current_thread());
        Ok(doc.page_count())
    });
    assert!(matches!(nested, Ok(Err(PdfError::GateReentered))));
    assert!(!gate_held_by_current_thread());
    assert_eq!(doc.page_count().unwrap(), 19);
}

#[test]
#[serial]
fn test_gate_survives_panic() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = library.with_engine(|_| -> pdfium_gate::Result<()> { panic!("boom") });
    }));
    assert!(result.is_err());
    assert!(!gate_held_by_current_thread());
    assert_eq!(doc.page_count().unwrap(), 19);
}

#[test]
#[serial]
fn test_error_inside_gate_propagates() {
    let (library, _probe) = init();
    let result: pdfium_gate::Result<()> =
        library.with_engine(|_| Err(PdfError::SaveFailed { reason: "custom".into() }));
    match result {
        Err(PdfError::SaveFailed { reason }) => assert_eq!(reason, "custom"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(library.is_active());
}
