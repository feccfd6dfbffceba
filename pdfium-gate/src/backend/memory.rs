//! In-process engine for tests and examples
//!
//! [`MemoryEngine`] behaves like the native engine at the API seam without
//! parsing real PDF files. Documents are [`MemoryDocument`] values stored as
//! JSON behind a `%MEMPDF` header, so they survive the same load, import and
//! save round-trips a PDF would. Error codes follow the native table: a
//! missing file is 2, anything that is not a memory document is 3, and a
//! wrong or missing password is 4.
//!
//! An [`EngineProbe`] shared with the engine records how it was driven:
//! call counts, the highest number of overlapping calls, every release in
//! order, and handles still open. The probe also switches on failures that
//! real documents produce only rarely.

use crate::coords::PageRect;
use crate::engine::{DocumentSource, Matrix, NativeEngine, RawHandle, SaveMode};
use crate::handle::HandleKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const HEADER: &[u8] = b"%MEMPDF-1\n";

const ERR_SUCCESS: u32 = 0;
const ERR_FILE: u32 = 2;
const ERR_FORMAT: u32 = 3;
const ERR_PASSWORD: u32 = 4;
const ERR_PAGE: u32 = 6;

/// Annotation subtype code for links.
pub const SUBTYPE_LINK: i32 = 2;
/// Action type code for URI actions.
pub const ACTION_URI: u32 = 3;

// ============================================================================
// Document model
// ============================================================================

/// A document as the memory engine stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Version number as the engine reports it (`17` for 1.7).
    pub version: Option<i32>,
    pub password: Option<String>,
    pub pages: Vec<MemoryPage>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            version: Some(17),
            password: None,
            pages: Vec::new(),
        }
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: Option<i32>) -> Self {
        self.version = version;
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    /// Append `count` plain pages labelled `"{prefix}-{n}"` (1-based).
    pub fn pages(mut self, prefix: &str, count: usize, width: f64, height: f64) -> Self {
        let start = self.pages.len();
        for n in 0..count {
            self.pages.push(
                MemoryPage::new(width, height).label(&format!("{}-{}", prefix, start + n + 1)),
            );
        }
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        // Serializing plain data with string keys cannot fail.
        if let Ok(json) = serde_json::to_vec(self) {
            bytes.extend_from_slice(&json);
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let json = bytes.strip_prefix(HEADER)?;
        serde_json::from_slice(json).ok()
    }
}

/// One page. `width`/`height` are the unrotated media size in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPage {
    pub width: f64,
    pub height: f64,
    pub rotation: i32,
    pub label: String,
    pub background_alpha: u8,
    pub glyphs: Vec<MemoryGlyph>,
    pub annotations: Vec<MemoryAnnotation>,
    pub images: Vec<MemoryImage>,
}

impl MemoryPage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            rotation: 0,
            label: String::new(),
            background_alpha: 255,
            glyphs: Vec::new(),
            annotations: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn rotation(mut self, quarter_turns: i32) -> Self {
        self.rotation = quarter_turns;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn background_alpha(mut self, alpha: u8) -> Self {
        self.background_alpha = alpha;
        self
    }

    pub fn glyph(mut self, glyph: MemoryGlyph) -> Self {
        self.glyphs.push(glyph);
        self
    }

    /// Lay `text` out on one line with its baseline at `(x, y)`.
    pub fn text(mut self, text: &str, x: f64, y: f64, font_size: f64) -> Self {
        let advance = font_size * 0.5;
        for (i, ch) in text.chars().enumerate() {
            let left = x + advance * i as f64;
            self.glyphs.push(
                MemoryGlyph::new(ch, [left, y + font_size * 0.7, left + advance, y])
                    .font_size(font_size),
            );
        }
        self
    }

    pub fn link(mut self, rect: [f64; 4], uri: &str) -> Self {
        self.annotations.push(MemoryAnnotation {
            subtype: SUBTYPE_LINK,
            rect,
            action: Some(MemoryAction {
                kind: ACTION_URI,
                uri: uri.to_string(),
            }),
        });
        self
    }

    pub fn annotation(mut self, annotation: MemoryAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    fn displayed_size(&self) -> (f64, f64) {
        if self.rotation.rem_euclid(2) == 1 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// One glyph of the page's text layer. Rectangles are `[left, top, right, bottom]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryGlyph {
    pub ch: char,
    pub font_size: f64,
    /// Radians.
    pub angle: f32,
    pub render_mode: i32,
    pub stroke: Option<[u8; 4]>,
    pub origin: Option<(f64, f64)>,
    pub bounds: Option<[f64; 4]>,
    pub loose_bounds: Option<[f64; 4]>,
    pub font: Option<(String, i32)>,
}

impl MemoryGlyph {
    pub fn new(ch: char, bounds: [f64; 4]) -> Self {
        Self {
            ch,
            font_size: 12.0,
            angle: 0.0,
            render_mode: 0,
            stroke: Some([0, 0, 0, 255]),
            origin: Some((bounds[0], bounds[3])),
            bounds: Some(bounds),
            loose_bounds: None,
            font: Some(("Helvetica".to_string(), 0x20)),
        }
    }

    /// Glyph whose geometry the engine cannot report.
    pub fn without_bounds(ch: char) -> Self {
        Self {
            bounds: None,
            origin: None,
            ..Self::new(ch, [0.0; 4])
        }
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    pub fn angle(mut self, radians: f32) -> Self {
        self.angle = radians;
        self
    }

    pub fn render_mode(mut self, mode: i32) -> Self {
        self.render_mode = mode;
        self
    }

    pub fn stroke(mut self, rgba: Option<[u8; 4]>) -> Self {
        self.stroke = rgba;
        self
    }

    pub fn origin(mut self, origin: Option<(f64, f64)>) -> Self {
        self.origin = origin;
        self
    }

    pub fn loose_bounds(mut self, bounds: [f64; 4]) -> Self {
        self.loose_bounds = Some(bounds);
        self
    }

    pub fn font(mut self, name: &str, flags: i32) -> Self {
        self.font = Some((name.to_string(), flags));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAnnotation {
    pub subtype: i32,
    pub rect: [f64; 4],
    pub action: Option<MemoryAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAction {
    pub kind: u32,
    pub uri: String,
}

/// An image object placed on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryImage {
    pub byte_len: usize,
    /// False when the loaded bytes were not JPEG; the image is then empty.
    pub decoded: bool,
    pub matrix: [f64; 6],
}

// ============================================================================
// Probe
// ============================================================================

#[derive(Default)]
struct ProbeInner {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    call_delay_micros: AtomicU64,
    live_handles: AtomicUsize,
    invalid_releases: AtomicUsize,
    init_count: AtomicUsize,
    destroy_count: AtomicUsize,
    form_draws: AtomicUsize,
    fail_render: AtomicBool,
    fail_text_load: AtomicBool,
    fail_save: AtomicBool,
    fail_import: AtomicBool,
    release_log: Mutex<Vec<(HandleKind, usize)>>,
    last_render: Mutex<Option<RenderCall>>,
    last_form_draw: Mutex<Option<FormDrawCall>>,
}

/// Arguments of the most recent page render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCall {
    pub matrix: Matrix,
    pub clip: PageRect,
    pub flags: u32,
    pub bitmap_width: i32,
    pub bitmap_height: i32,
}

/// Arguments of the most recent form-field draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormDrawCall {
    pub width: i32,
    pub height: i32,
    pub flags: u32,
}

/// Shared view into a [`MemoryEngine`]'s activity.
#[derive(Clone, Default)]
pub struct EngineProbe {
    inner: Arc<ProbeInner>,
}

impl EngineProbe {
    /// Number of engine calls so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Most calls ever observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Native handles currently open in the engine.
    pub fn live_handles(&self) -> usize {
        self.inner.live_handles.load(Ordering::SeqCst)
    }

    /// Close calls for handles the engine did not know (double release).
    pub fn invalid_releases(&self) -> usize {
        self.inner.invalid_releases.load(Ordering::SeqCst)
    }

    pub fn init_count(&self) -> usize {
        self.inner.init_count.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.inner.destroy_count.load(Ordering::SeqCst)
    }

    pub fn form_draws(&self) -> usize {
        self.inner.form_draws.load(Ordering::SeqCst)
    }

    /// Every close call in order, as `(kind, raw handle value)`.
    pub fn release_log(&self) -> Vec<(HandleKind, usize)> {
        lock(&self.inner.release_log).clone()
    }

    pub fn clear_release_log(&self) {
        lock(&self.inner.release_log).clear();
    }

    pub fn last_render(&self) -> Option<RenderCall> {
        *lock(&self.inner.last_render)
    }

    pub fn last_form_draw(&self) -> Option<FormDrawCall> {
        *lock(&self.inner.last_form_draw)
    }

    pub fn set_call_delay(&self, delay: Duration) {
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.inner.call_delay_micros.store(micros, Ordering::SeqCst);
    }

    pub fn set_fail_render(&self, fail: bool) {
        self.inner.fail_render.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_text_load(&self, fail: bool) {
        self.inner.fail_text_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.inner.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Make every page import report failure.
    pub fn set_fail_import(&self, fail: bool) {
        self.inner.fail_import.store(fail, Ordering::SeqCst);
    }

    fn enter(&self) -> CallGuard {
        let inner = Arc::clone(&self.inner);
        inner.calls.fetch_add(1, Ordering::SeqCst);
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = inner.call_delay_micros.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
        CallGuard { inner }
    }

    fn log_release(&self, kind: HandleKind, raw: RawHandle) {
        lock(&self.inner.release_log).push((kind, raw.value()));
    }

    fn flag(&self, flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

struct CallGuard {
    inner: Arc<ProbeInner>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug)]
enum Object {
    Document(MemoryDocument),
    Form { document: usize },
    Page { document: usize, index: usize },
    TextPage { document: usize, index: usize },
    Bitmap { width: i32, height: i32, pixels: Vec<u8> },
    Annotation { document: usize, page: usize, index: usize },
    Image(MemoryImage),
}

/// Engine simulation backed by [`MemoryDocument`] values.
#[derive(Default)]
pub struct MemoryEngine {
    objects: HashMap<usize, Object>,
    next_handle: usize,
    last_error: u32,
    probe: EngineProbe,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }

    fn insert(&mut self, object: Object) -> RawHandle {
        self.next_handle += 1;
        self.objects.insert(self.next_handle, object);
        self.sync_live();
        RawHandle::new(self.next_handle)
    }

    fn remove(&mut self, kind: HandleKind, raw: RawHandle) -> Option<Object> {
        self.probe.log_release(kind, raw);
        let removed = self.objects.remove(&raw.value());
        if removed.is_none() {
            self.probe
                .inner
                .invalid_releases
                .fetch_add(1, Ordering::SeqCst);
        }
        self.sync_live();
        removed
    }

    fn sync_live(&self) {
        self.probe
            .inner
            .live_handles
            .store(self.objects.len(), Ordering::SeqCst);
    }

    fn document(&self, raw: RawHandle) -> Option<&MemoryDocument> {
        match self.objects.get(&raw.value()) {
            Some(Object::Document(doc)) => Some(doc),
            _ => None,
        }
    }

    fn document_mut(&mut self, raw: usize) -> Option<&mut MemoryDocument> {
        match self.objects.get_mut(&raw) {
            Some(Object::Document(doc)) => Some(doc),
            _ => None,
        }
    }

    fn page(&self, raw: RawHandle) -> Option<&MemoryPage> {
        match self.objects.get(&raw.value()) {
            Some(Object::Page { document, index }) => self.page_at(*document, *index),
            _ => None,
        }
    }

    fn page_at(&self, document: usize, index: usize) -> Option<&MemoryPage> {
        match self.objects.get(&document) {
            Some(Object::Document(doc)) => doc.pages.get(index),
            _ => None,
        }
    }

    fn page_location(&self, raw: RawHandle) -> Option<(usize, usize)> {
        match self.objects.get(&raw.value()) {
            Some(Object::Page { document, index }) => Some((*document, *index)),
            _ => None,
        }
    }

    fn glyph(&self, text: RawHandle, index: i32) -> Option<&MemoryGlyph> {
        let index = usize::try_from(index).ok()?;
        match self.objects.get(&text.value()) {
            Some(Object::TextPage { document, index: page }) => {
                self.page_at(*document, *page)?.glyphs.get(index)
            }
            _ => None,
        }
    }

    fn annotation(&self, raw: RawHandle) -> Option<&MemoryAnnotation> {
        match self.objects.get(&raw.value()) {
            Some(Object::Annotation {
                document,
                page,
                index,
            }) => self.page_at(*document, *page)?.annotations.get(*index),
            _ => None,
        }
    }

    fn load(
        &self,
        source: DocumentSource<'_>,
        password: Option<&str>,
    ) -> Result<MemoryDocument, u32> {
        let bytes = match source {
            DocumentSource::Path(path) => std::fs::read(path).map_err(|_| ERR_FILE)?,
            DocumentSource::Bytes(bytes) => bytes.to_vec(),
        };
        let doc = MemoryDocument::from_bytes(&bytes).ok_or(ERR_FORMAT)?;
        if let Some(expected) = &doc.password {
            if password != Some(expected.as_str()) {
                return Err(ERR_PASSWORD);
            }
        }
        Ok(doc)
    }
}

fn rect(values: [f64; 4]) -> PageRect {
    PageRect::new(values[0], values[1], values[2], values[3])
}

/// Pages selected by a 1-based range string, or `None` if it is malformed
/// or out of bounds.
fn select_pages(range: &str, page_count: usize) -> Option<Vec<usize>> {
    let range = crate::page_range::PageRange::parse(range).ok()?;
    if range.max_page() as usize > page_count {
        return None;
    }
    Some(range.pages().map(|p| p as usize - 1).collect())
}

fn label_color(label: &str) -> [u8; 3] {
    // FNV-1a
    let mut hash: u32 = 0x811c_9dc5;
    for byte in label.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let [b, g, r, _] = hash.to_le_bytes();
    [b, g, r]
}

impl NativeEngine for MemoryEngine {
    fn init_library(&mut self) {
        let _call = self.probe.enter();
        self.probe.inner.init_count.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy_library(&mut self) {
        let _call = self.probe.enter();
        self.probe.log_release(HandleKind::Library, RawHandle::NULL);
        self.probe.inner.destroy_count.fetch_add(1, Ordering::SeqCst);
    }

    fn last_error(&mut self) -> u32 {
        let _call = self.probe.enter();
        self.last_error
    }

    fn load_document(&mut self, source: DocumentSource<'_>, password: Option<&str>) -> RawHandle {
        let _call = self.probe.enter();
        match self.load(source, password) {
            Ok(doc) => {
                self.last_error = ERR_SUCCESS;
                self.insert(Object::Document(doc))
            }
            Err(code) => {
                self.last_error = code;
                RawHandle::NULL
            }
        }
    }

    fn create_document(&mut self) -> RawHandle {
        let _call = self.probe.enter();
        self.insert(Object::Document(MemoryDocument::new().version(None)))
    }

    fn close_document(&mut self, document: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::Document, document);
    }

    fn page_count(&mut self, document: RawHandle) -> i32 {
        let _call = self.probe.enter();
        self.document(document)
            .map(|doc| doc.pages.len() as i32)
            .unwrap_or(0)
    }

    fn file_version(&mut self, document: RawHandle) -> Option<i32> {
        let _call = self.probe.enter();
        self.document(document).and_then(|doc| doc.version)
    }

    fn import_pages(
        &mut self,
        dest: RawHandle,
        src: RawHandle,
        range: Option<&str>,
        insert_at: i32,
    ) -> bool {
        let _call = self.probe.enter();
        if self.probe.flag(&self.probe.inner.fail_import) {
            return false;
        }
        let Some(source) = self.document(src) else {
            return false;
        };
        let selected = match range {
            Some(range) => match select_pages(range, source.pages.len()) {
                Some(selected) => selected,
                None => return false,
            },
            None => (0..source.pages.len()).collect(),
        };
        let pages: Vec<MemoryPage> = selected.iter().map(|&i| source.pages[i].clone()).collect();

        let Some(target) = self.document_mut(dest.value()) else {
            return false;
        };
        let at = usize::try_from(insert_at).unwrap_or(0).min(target.pages.len());
        target.pages.splice(at..at, pages);
        true
    }

    fn save_as_copy(&mut self, document: RawHandle, mode: SaveMode) -> Option<Vec<u8>> {
        let _call = self.probe.enter();
        if self.probe.flag(&self.probe.inner.fail_save) {
            return None;
        }
        let mut doc = self.document(document)?.clone();
        if mode == SaveMode::RemoveSecurity {
            doc.password = None;
        }
        if doc.version.is_none() {
            doc.version = Some(17);
        }
        Some(doc.to_bytes())
    }

    fn init_form_environment(&mut self, document: RawHandle) -> RawHandle {
        let _call = self.probe.enter();
        if self.document(document).is_none() {
            return RawHandle::NULL;
        }
        self.insert(Object::Form {
            document: document.value(),
        })
    }

    fn exit_form_environment(&mut self, form: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::FormEnvironment, form);
    }

    fn draw_form_fields(
        &mut self,
        form: RawHandle,
        _bitmap: RawHandle,
        _page: RawHandle,
        width: i32,
        height: i32,
        flags: u32,
    ) {
        let _call = self.probe.enter();
        if matches!(self.objects.get(&form.value()), Some(Object::Form { .. })) {
            self.probe.inner.form_draws.fetch_add(1, Ordering::SeqCst);
            *lock(&self.probe.inner.last_form_draw) = Some(FormDrawCall {
                width,
                height,
                flags,
            });
        }
    }

    fn load_page(&mut self, document: RawHandle, index: i32) -> RawHandle {
        let _call = self.probe.enter();
        let exists = usize::try_from(index)
            .ok()
            .filter(|&i| self.page_at(document.value(), i).is_some());
        match exists {
            Some(index) => self.insert(Object::Page {
                document: document.value(),
                index,
            }),
            None => {
                self.last_error = ERR_PAGE;
                RawHandle::NULL
            }
        }
    }

    fn new_page(&mut self, document: RawHandle, index: i32, width: f64, height: f64) -> RawHandle {
        let _call = self.probe.enter();
        let Some(doc) = self.document_mut(document.value()) else {
            return RawHandle::NULL;
        };
        let at = usize::try_from(index).unwrap_or(0).min(doc.pages.len());
        doc.pages.insert(at, MemoryPage::new(width, height));
        self.insert(Object::Page {
            document: document.value(),
            index: at,
        })
    }

    fn close_page(&mut self, page: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::Page, page);
    }

    fn page_width(&mut self, page: RawHandle) -> f64 {
        let _call = self.probe.enter();
        self.page(page).map(|p| p.displayed_size().0).unwrap_or(0.0)
    }

    fn page_height(&mut self, page: RawHandle) -> f64 {
        let _call = self.probe.enter();
        self.page(page).map(|p| p.displayed_size().1).unwrap_or(0.0)
    }

    fn page_rotation(&mut self, page: RawHandle) -> i32 {
        let _call = self.probe.enter();
        self.page(page).map(|p| p.rotation).unwrap_or(0)
    }

    fn generate_content(&mut self, page: RawHandle) -> bool {
        let _call = self.probe.enter();
        self.page(page).is_some()
    }

    fn load_text_page(&mut self, page: RawHandle) -> RawHandle {
        let _call = self.probe.enter();
        if self.probe.flag(&self.probe.inner.fail_text_load) {
            return RawHandle::NULL;
        }
        match self.page_location(page) {
            Some((document, index)) => self.insert(Object::TextPage { document, index }),
            None => RawHandle::NULL,
        }
    }

    fn close_text_page(&mut self, text: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::TextPage, text);
    }

    fn count_chars(&mut self, text: RawHandle) -> i32 {
        let _call = self.probe.enter();
        match self.objects.get(&text.value()) {
            Some(Object::TextPage { document, index }) => self
                .page_at(*document, *index)
                .map(|p| p.glyphs.len() as i32)
                .unwrap_or(-1),
            _ => -1,
        }
    }

    fn text_range(&mut self, text: RawHandle, start: i32, count: i32) -> Vec<u16> {
        let _call = self.probe.enter();
        let (Ok(start), Ok(count)) = (usize::try_from(start), usize::try_from(count)) else {
            return Vec::new();
        };
        let glyphs = match self.objects.get(&text.value()) {
            Some(Object::TextPage { document, index }) => match self.page_at(*document, *index) {
                Some(page) => &page.glyphs,
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        let mut units: Vec<u16> = glyphs
            .iter()
            .skip(start)
            .take(count)
            .flat_map(|g| {
                let mut buf = [0u16; 2];
                g.ch.encode_utf16(&mut buf).to_vec()
            })
            .collect();
        // The engine always NUL-terminates.
        units.push(0);
        units
    }

    fn char_unicode(&mut self, text: RawHandle, index: i32) -> u32 {
        let _call = self.probe.enter();
        self.glyph(text, index).map(|g| u32::from(g.ch)).unwrap_or(0)
    }

    fn char_font_size(&mut self, text: RawHandle, index: i32) -> f64 {
        let _call = self.probe.enter();
        self.glyph(text, index).map(|g| g.font_size).unwrap_or(0.0)
    }

    fn char_angle(&mut self, text: RawHandle, index: i32) -> f32 {
        let _call = self.probe.enter();
        self.glyph(text, index).map(|g| g.angle).unwrap_or(-1.0)
    }

    fn char_render_mode(&mut self, text: RawHandle, index: i32) -> i32 {
        let _call = self.probe.enter();
        self.glyph(text, index).map(|g| g.render_mode).unwrap_or(-1)
    }

    fn char_stroke_color(&mut self, text: RawHandle, index: i32) -> Option<[u8; 4]> {
        let _call = self.probe.enter();
        self.glyph(text, index).and_then(|g| g.stroke)
    }

    fn char_origin(&mut self, text: RawHandle, index: i32) -> Option<(f64, f64)> {
        let _call = self.probe.enter();
        self.glyph(text, index).and_then(|g| g.origin)
    }

    fn char_box(&mut self, text: RawHandle, index: i32) -> Option<PageRect> {
        let _call = self.probe.enter();
        self.glyph(text, index).and_then(|g| g.bounds).map(rect)
    }

    fn char_loose_box(&mut self, text: RawHandle, index: i32) -> Option<PageRect> {
        let _call = self.probe.enter();
        self.glyph(text, index).and_then(|g| g.loose_bounds).map(rect)
    }

    fn char_font_info(&mut self, text: RawHandle, index: i32) -> Option<(String, i32)> {
        let _call = self.probe.enter();
        self.glyph(text, index).and_then(|g| g.font.clone())
    }

    fn create_bitmap(&mut self, width: i32, height: i32, _alpha: bool) -> RawHandle {
        let _call = self.probe.enter();
        if width <= 0 || height <= 0 {
            return RawHandle::NULL;
        }
        let len = width as usize * height as usize * 4;
        self.insert(Object::Bitmap {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    fn render_page_bitmap(
        &mut self,
        bitmap: RawHandle,
        page: RawHandle,
        matrix: &Matrix,
        clip: &PageRect,
        flags: u32,
    ) -> bool {
        let _call = self.probe.enter();
        if self.probe.flag(&self.probe.inner.fail_render) {
            return false;
        }
        let Some(page) = self.page(page) else {
            return false;
        };
        let [mut b, mut g, mut r] = label_color(&page.label);
        let alpha = page.background_alpha;
        if flags & 0x08 != 0 {
            let gray = ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000) as u8;
            (b, g, r) = (gray, gray, gray);
        }

        let Some(Object::Bitmap {
            width,
            height,
            pixels,
        }) = self.objects.get_mut(&bitmap.value())
        else {
            return false;
        };
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[b, g, r, alpha]);
        }
        *lock(&self.probe.inner.last_render) = Some(RenderCall {
            matrix: *matrix,
            clip: *clip,
            flags,
            bitmap_width: *width,
            bitmap_height: *height,
        });
        true
    }

    fn bitmap_bytes(&mut self, bitmap: RawHandle) -> Option<Vec<u8>> {
        let _call = self.probe.enter();
        match self.objects.get(&bitmap.value()) {
            Some(Object::Bitmap { pixels, .. }) => Some(pixels.clone()),
            _ => None,
        }
    }

    fn destroy_bitmap(&mut self, bitmap: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::Bitmap, bitmap);
    }

    fn annotation_count(&mut self, page: RawHandle) -> i32 {
        let _call = self.probe.enter();
        self.page(page)
            .map(|p| p.annotations.len() as i32)
            .unwrap_or(0)
    }

    fn open_annotation(&mut self, page: RawHandle, index: i32) -> RawHandle {
        let _call = self.probe.enter();
        let Some((document, page_index)) = self.page_location(page) else {
            return RawHandle::NULL;
        };
        let Ok(index) = usize::try_from(index) else {
            return RawHandle::NULL;
        };
        let exists = self
            .page_at(document, page_index)
            .is_some_and(|p| index < p.annotations.len());
        if !exists {
            return RawHandle::NULL;
        }
        self.insert(Object::Annotation {
            document,
            page: page_index,
            index,
        })
    }

    fn close_annotation(&mut self, annotation: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::Annotation, annotation);
    }

    fn annotation_subtype(&mut self, annotation: RawHandle) -> i32 {
        let _call = self.probe.enter();
        self.annotation(annotation).map(|a| a.subtype).unwrap_or(0)
    }

    fn annotation_rect(&mut self, annotation: RawHandle) -> Option<PageRect> {
        let _call = self.probe.enter();
        self.annotation(annotation).map(|a| rect(a.rect))
    }

    fn annotation_link(&mut self, annotation: RawHandle) -> RawHandle {
        let _call = self.probe.enter();
        // Links and actions alias their annotation's handle.
        match self.annotation(annotation) {
            Some(a) if a.subtype == SUBTYPE_LINK => annotation,
            _ => RawHandle::NULL,
        }
    }

    fn link_action(&mut self, link: RawHandle) -> RawHandle {
        let _call = self.probe.enter();
        match self.annotation(link) {
            Some(a) if a.action.is_some() => link,
            _ => RawHandle::NULL,
        }
    }

    fn action_type(&mut self, action: RawHandle) -> u32 {
        let _call = self.probe.enter();
        self.annotation(action)
            .and_then(|a| a.action.as_ref())
            .map(|a| a.kind)
            .unwrap_or(0)
    }

    fn action_uri_path(
        &mut self,
        _document: RawHandle,
        action: RawHandle,
        buffer: &mut [u8],
    ) -> usize {
        let _call = self.probe.enter();
        let Some(uri) = self
            .annotation(action)
            .and_then(|a| a.action.as_ref())
            .filter(|a| a.kind == ACTION_URI)
            .map(|a| a.uri.as_bytes())
        else {
            return 0;
        };
        let needed = uri.len() + 1;
        if buffer.len() >= needed {
            buffer[..uri.len()].copy_from_slice(uri);
            buffer[uri.len()] = 0;
        }
        needed
    }

    fn new_image_object(&mut self, document: RawHandle) -> RawHandle {
        let _call = self.probe.enter();
        if self.document(document).is_none() {
            return RawHandle::NULL;
        }
        self.insert(Object::Image(MemoryImage::default()))
    }

    fn load_jpeg_inline(&mut self, _page: RawHandle, image: RawHandle, data: &[u8]) -> bool {
        let _call = self.probe.enter();
        let Some(Object::Image(image)) = self.objects.get_mut(&image.value()) else {
            return false;
        };
        image.byte_len = data.len();
        image.decoded = data.starts_with(&[0xFF, 0xD8, 0xFF]);
        true
    }

    fn set_image_matrix(&mut self, image: RawHandle, matrix: &Matrix) -> bool {
        let _call = self.probe.enter();
        let Some(Object::Image(image)) = self.objects.get_mut(&image.value()) else {
            return false;
        };
        image.matrix = [matrix.a, matrix.b, matrix.c, matrix.d, matrix.e, matrix.f];
        true
    }

    fn insert_page_object(&mut self, page: RawHandle, object: RawHandle) {
        let _call = self.probe.enter();
        let Some((document, index)) = self.page_location(page) else {
            return;
        };
        if !matches!(self.objects.get(&object.value()), Some(Object::Image(_))) {
            return;
        }
        let Some(Object::Image(image)) = self.objects.remove(&object.value()) else {
            return;
        };
        self.sync_live();
        if let Some(page) = self
            .document_mut(document)
            .and_then(|doc| doc.pages.get_mut(index))
        {
            page.images.push(image);
        }
    }

    fn destroy_page_object(&mut self, object: RawHandle) {
        let _call = self.probe.enter();
        self.remove(HandleKind::PageObject, object);
    }
}
