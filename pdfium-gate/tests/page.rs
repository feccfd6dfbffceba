//! Page sessions: geometry, text, glyphs, rendering and links

mod common;

use common::{init, native, nineteen_pages, single_page};
use pdfium_gate::backend::memory::{
    FormDrawCall, MemoryAction, MemoryAnnotation, MemoryGlyph, MemoryPage,
};
use pdfium_gate::{
    BoundBox, DevicePoint, Matrix, NaiveTransparencyRemover, PageRect, PageRotation, PdfError,
    RenderFlags, ScalingPolicy, TextRenderMode,
};
use serial_test::serial;

fn glyph_page() -> MemoryPage {
    MemoryPage::new(100.0, 200.0)
        .glyph(MemoryGlyph::new('A', [10.0, 190.0, 20.0, 180.0]))
        .glyph(MemoryGlyph::without_bounds('\u{200b}'))
        .glyph(
            MemoryGlyph::new('b', [20.0, 190.0, 30.0, 180.0])
                .font_size(1.0)
                .render_mode(3)
                .stroke(None)
                .loose_bounds([19.0, 192.0, 31.0, 178.0])
                .font("Courier", 0x01),
        )
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
#[serial]
fn test_viewport_scale_fits_page() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, ScalingPolicy::viewport(1080, 1920).unwrap())
        .unwrap();
    let page = doc.open_page(0).unwrap();

    let (w, h) = (page.width().unwrap(), page.height().unwrap());
    assert!(w <= 1080 && h <= 1920);
    assert!((page.scale() - 1080.0 / 595.0).abs() < 1e-9);
    assert_eq!(page.index(), 0);
}

#[test]
#[serial]
fn test_rotation_reported() {
    let (library, _probe) = init();
    let bytes = single_page(MemoryPage::new(100.0, 200.0).rotation(3));
    let doc = library.load_document_from_bytes(bytes, None, native()).unwrap();
    let page = doc.open_page(0).unwrap();

    assert_eq!(page.rotation().unwrap(), PageRotation::Clockwise270);
    // Width and height are reported as displayed.
    assert_eq!(page.width().unwrap(), 200);
    assert_eq!(page.height().unwrap(), 100);
}

// ============================================================================
// Text
// ============================================================================

#[test]
#[serial]
fn test_full_text() {
    let (library, _probe) = init();
    let bytes = single_page(MemoryPage::new(300.0, 300.0).text("Hello, world", 10.0, 100.0, 10.0));
    let doc = library.load_document_from_bytes(bytes, None, native()).unwrap();
    let page = doc.open_page(0).unwrap();
    assert_eq!(page.text().unwrap(), "Hello, world");
}

#[test]
#[serial]
fn test_empty_page_has_empty_text() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let page = doc.open_page(4).unwrap();
    assert_eq!(page.text().unwrap(), "");
    assert_eq!(page.characters().unwrap().count(), 0);
}

#[test]
#[serial]
fn test_characters_skip_glyphs_without_box() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(single_page(glyph_page()), None, ScalingPolicy::scale(2.0).unwrap())
        .unwrap();
    let page = doc.open_page(0).unwrap();

    let chars: Vec<_> = page
        .characters()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(chars.len(), 2);

    let a = &chars[0];
    assert_eq!(a.index, 0);
    assert_eq!(a.codepoint, 'A');
    assert_eq!(a.bounds, BoundBox::new(20, 20, 40, 40).unwrap());
    assert_eq!(a.loose_bounds, a.bounds);
    assert_eq!(a.origin, DevicePoint { x: 20, y: 40 });
    assert_eq!(a.font_size, 24.0);
    assert_eq!(a.angle, 0.0);
    assert_eq!(a.render_mode, TextRenderMode::Fill);
    assert_eq!(a.stroke_color, Some([0, 0, 0, 255]));
    assert_eq!(a.font_info.as_ref().unwrap().name, "Helvetica");

    let b = &chars[1];
    assert_eq!(b.index, 2);
    assert_eq!(b.codepoint, 'b');
    // The "no adjustment" size is not scaled.
    assert_eq!(b.font_size, 1.0);
    assert_eq!(b.render_mode, TextRenderMode::Invisible);
    assert_eq!(b.stroke_color, None);
    assert_eq!(b.loose_bounds, BoundBox::new(38, 16, 62, 44).unwrap());
    assert_eq!(b.font_info.as_ref().unwrap().flags, 0x01);
}

#[test]
#[serial]
fn test_characters_restart() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(single_page(glyph_page()), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();

    let first: Vec<_> = page.characters().unwrap().map(|c| c.unwrap().codepoint).collect();
    let second: Vec<_> = page.characters().unwrap().map(|c| c.unwrap().codepoint).collect();
    assert_eq!(first, vec!['A', 'b']);
    assert_eq!(first, second);
}

#[test]
#[serial]
fn test_characters_release_gate_between_glyphs() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(single_page(glyph_page()), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();

    for glyph in page.characters().unwrap() {
        glyph.unwrap();
        assert!(!pdfium_gate::gate_held_by_current_thread());
        assert_eq!(doc.page_count().unwrap(), 1);
    }
}

#[test]
#[serial]
fn test_characters_on_rotated_page() {
    let (library, _probe) = init();
    let page = MemoryPage::new(100.0, 200.0)
        .rotation(1)
        .glyph(MemoryGlyph::new('R', [10.0, 190.0, 20.0, 180.0]).angle(0.0));
    let doc = library
        .load_document_from_bytes(single_page(page), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();

    let glyph = page.characters().unwrap().next().unwrap().unwrap();
    assert_eq!(glyph.bounds, BoundBox::new(180, 10, 190, 20).unwrap());
    assert_eq!(glyph.angle, 90.0);
}

#[test]
#[serial]
fn test_characters_after_close() {
    let (library, _probe) = init();
    let doc = library
        .load_document_from_bytes(single_page(glyph_page()), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();
    let mut chars = page.characters().unwrap();
    page.close().unwrap();

    assert!(matches!(chars.next(), Some(Err(PdfError::SessionDisposed))));
    assert!(chars.next().is_none());
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
#[serial]
fn test_image_size_and_matrix() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, ScalingPolicy::scale(0.5).unwrap())
        .unwrap();
    let page = doc.open_page(1).unwrap();
    let live = probe.live_handles();

    let bytes = page.image(RenderFlags::NONE).unwrap();
    let (w, h) = (page.width().unwrap(), page.height().unwrap());
    assert_eq!((w, h), (297, 420));
    assert_eq!(bytes.len(), (w * h * 4) as usize);

    let call = probe.last_render().unwrap();
    assert_eq!(call.matrix, Matrix::scale(0.5));
    assert_eq!(call.clip, PageRect::new(0.0, 0.0, 297.0, 420.0));
    assert_eq!((call.bitmap_width, call.bitmap_height), (297, 420));
    // The bitmap is gone once the pixels are copied out.
    assert_eq!(probe.live_handles(), live);
}

#[test]
#[serial]
fn test_image_flags_pass_through() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();

    page.image(RenderFlags::GRAYSCALE | RenderFlags::PRINTING).unwrap();
    assert_eq!(probe.last_render().unwrap().flags, 0x808);
    assert_eq!(probe.form_draws(), 0);

    page.image(RenderFlags::RENDER_ANNOTATIONS).unwrap();
    assert_eq!(probe.form_draws(), 1);
}

#[test]
#[serial]
fn test_form_fields_drawn_in_displayed_orientation() {
    let (library, probe) = init();
    let bytes = single_page(MemoryPage::new(100.0, 200.0).rotation(3));
    let doc = library.load_document_from_bytes(bytes, None, native()).unwrap();
    let page = doc.open_page(0).unwrap();

    page.image(RenderFlags::RENDER_ANNOTATIONS).unwrap();
    let render = probe.last_render().unwrap();
    assert_eq!(render.matrix, Matrix::scale(1.0));
    assert_eq!((render.bitmap_width, render.bitmap_height), (200, 100));

    // Same surface as the page render; rotation is left to the render call.
    assert_eq!(
        probe.last_form_draw(),
        Some(FormDrawCall {
            width: 200,
            height: 100,
            flags: 0x01,
        })
    );
}

#[test]
#[serial]
fn test_render_failure_releases_bitmap() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let page = doc.open_page(2).unwrap();
    let live = probe.live_handles();
    probe.set_fail_render(true);

    let result = page.image(RenderFlags::NONE);
    assert!(matches!(result, Err(PdfError::RenderFailed { index: 2, .. })));
    assert_eq!(probe.live_handles(), live);
    assert_eq!(probe.invalid_releases(), 0);
}

#[test]
#[serial]
fn test_image_with_transparency_remover() {
    let (library, _probe) = init();
    let bytes = single_page(MemoryPage::new(4.0, 4.0).background_alpha(0));
    let doc = library.load_document_from_bytes(bytes, None, native()).unwrap();
    let page = doc.open_page(0).unwrap();

    let raw = page.image(RenderFlags::NONE).unwrap();
    assert!(raw.chunks_exact(4).all(|px| px[3] == 0));

    let flat = page
        .image_with(&NaiveTransparencyRemover::default(), RenderFlags::NONE)
        .unwrap();
    assert_eq!(flat.len(), 4 * 4 * 4);
    assert!(flat.chunks_exact(4).all(|px| px == [254, 254, 254, 255]));
}

// ============================================================================
// Links
// ============================================================================

#[test]
#[serial]
fn test_uri_annotations() {
    let (library, probe) = init();
    let long_uri = format!("https://example.com/{}", "x".repeat(300));
    let page = MemoryPage::new(100.0, 200.0)
        .link([10.0, 190.0, 60.0, 170.0], "https://example.com/")
        .annotation(MemoryAnnotation {
            subtype: 1,
            rect: [0.0, 10.0, 10.0, 0.0],
            action: None,
        })
        .annotation(MemoryAnnotation {
            subtype: 2,
            rect: [0.0, 10.0, 10.0, 0.0],
            action: Some(MemoryAction {
                kind: 1,
                uri: String::new(),
            }),
        })
        .link([0.0, 50.0, 100.0, 0.0], &long_uri);
    let doc = library
        .load_document_from_bytes(single_page(page), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();
    let live = probe.live_handles();

    let links = page.uri_annotations().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].uri, "https://example.com/");
    assert_eq!(links[0].bounds, BoundBox::new(10, 10, 60, 30).unwrap());
    assert_eq!(links[1].uri, long_uri);
    assert_eq!(links[1].bounds, BoundBox::new(0, 150, 99, 199).unwrap());
    assert_eq!(probe.live_handles(), live);
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
#[serial]
fn test_page_close_order_and_idempotence() {
    let (library, probe) = init();
    let doc = library
        .load_document_from_bytes(nineteen_pages(), None, native())
        .unwrap();
    let page = doc.open_page(0).unwrap();
    probe.clear_release_log();

    page.close().unwrap();
    page.close().unwrap();
    let kinds: Vec<_> = probe.release_log().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(
        kinds,
        vec![pdfium_gate::HandleKind::TextPage, pdfium_gate::HandleKind::Page]
    );
    assert!(matches!(page.width(), Err(PdfError::SessionDisposed)));
    assert_eq!(doc.page_count().unwrap(), 19);
}
