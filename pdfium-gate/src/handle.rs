//! Native handle ownership
//!
//! Every native resource the crate opens is recorded in a [`HandleArena`]
//! with its kind and the handle it was derived from. Releasing a handle
//! releases its children first, newest first, so a text page is always
//! closed before its page and a page before its document.
//!
//! Sessions refer to their handles by [`HandleId`]. Once released, an id
//! no longer resolves and the raw pointer behind it is never seen again.

use crate::engine::{NativeEngine, RawHandle};
use crate::error::{PdfError, Result};
use crate::gate::EngineState;
use std::collections::HashMap;

/// Kind of native resource behind a handle, deciding how it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Library,
    Document,
    FormEnvironment,
    Page,
    TextPage,
    Bitmap,
    Annotation,
    PageObject,
}

impl HandleKind {
    fn close(self, engine: &mut dyn NativeEngine, raw: RawHandle) {
        match self {
            HandleKind::Library => engine.destroy_library(),
            HandleKind::Document => engine.close_document(raw),
            HandleKind::FormEnvironment => engine.exit_form_environment(raw),
            HandleKind::Page => engine.close_page(raw),
            HandleKind::TextPage => engine.close_text_page(raw),
            HandleKind::Bitmap => engine.destroy_bitmap(raw),
            HandleKind::Annotation => engine.close_annotation(raw),
            HandleKind::PageObject => engine.destroy_page_object(raw),
        }
    }
}

/// Arena key for one live native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

#[derive(Debug)]
struct Entry {
    kind: HandleKind,
    raw: RawHandle,
    parent: Option<HandleId>,
    /// In acquisition order.
    children: Vec<HandleId>,
}

/// Owner of every live native handle.
#[derive(Debug, Default)]
pub struct HandleArena {
    entries: HashMap<HandleId, Entry>,
    next_id: u64,
}

impl HandleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle with no parent.
    pub fn insert_root(&mut self, kind: HandleKind, raw: RawHandle) -> HandleId {
        self.push(kind, raw, None)
    }

    /// Record a freshly opened handle under `parent`.
    pub fn insert(&mut self, kind: HandleKind, raw: RawHandle, parent: HandleId) -> Result<HandleId> {
        if !self.entries.contains_key(&parent) {
            return Err(PdfError::SessionDisposed);
        }
        Ok(self.push(kind, raw, Some(parent)))
    }

    fn push(&mut self, kind: HandleKind, raw: RawHandle, parent: Option<HandleId>) -> HandleId {
        self.next_id += 1;
        let id = HandleId(self.next_id);
        self.entries.insert(
            id,
            Entry {
                kind,
                raw,
                parent,
                children: Vec::new(),
            },
        );
        if let Some(parent) = parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.push(id);
        }
        id
    }

    /// Raw pointer for a live handle.
    pub fn raw(&self, id: HandleId) -> Result<RawHandle> {
        self.entries
            .get(&id)
            .map(|entry| entry.raw)
            .ok_or(PdfError::SessionDisposed)
    }

    pub fn kind(&self, id: HandleId) -> Option<HandleKind> {
        self.entries.get(&id).map(|entry| entry.kind)
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Close `id` and everything derived from it.
    ///
    /// Returns the number of native handles closed; releasing an unknown or
    /// already released id closes nothing.
    pub fn release(&mut self, engine: &mut dyn NativeEngine, id: HandleId) -> usize {
        let Some(entry) = self.entries.remove(&id) else {
            return 0;
        };

        if let Some(parent) = entry.parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }

        if !entry.children.is_empty() {
            log::debug!(
                "releasing {} child handle(s) of {:?} by cascade",
                entry.children.len(),
                entry.kind
            );
        }
        let mut closed = 0;
        for child in entry.children.iter().rev() {
            closed += self.release(engine, *child);
        }

        log::trace!("closing {:?} handle {:#x}", entry.kind, entry.raw.value());
        entry.kind.close(engine, entry.raw);
        closed + 1
    }

    /// Forget a handle whose ownership moved into the engine.
    ///
    /// Children of a detached handle stay live and become roots.
    pub fn detach(&mut self, id: HandleId) -> Option<RawHandle> {
        let entry = self.entries.remove(&id)?;
        if let Some(parent) = entry.parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }
        for child in &entry.children {
            if let Some(child) = self.entries.get_mut(child) {
                child.parent = None;
            }
        }
        Some(entry.raw)
    }
}

/// Handles acquired for the duration of one gated operation.
///
/// Whatever is not explicitly kept or transferred is released in reverse
/// acquisition order when the scope ends, on every exit path.
pub struct HandleScope<'s> {
    state: &'s mut EngineState,
    acquired: Vec<HandleId>,
}

impl<'s> HandleScope<'s> {
    pub(crate) fn new(state: &'s mut EngineState) -> Self {
        Self {
            state,
            acquired: Vec::new(),
        }
    }

    /// Open a handle under `parent`.
    ///
    /// Returns `Ok(None)` if the engine reports failure (a null handle).
    pub fn acquire<F>(
        &mut self,
        kind: HandleKind,
        parent: HandleId,
        open: F,
    ) -> Result<Option<HandleId>>
    where
        F: FnOnce(&mut dyn NativeEngine) -> RawHandle,
    {
        if !self.state.handles.is_live(parent) {
            return Err(PdfError::SessionDisposed);
        }

        let raw = open(self.state.engine.as_mut());
        if raw.is_null() {
            return Ok(None);
        }

        let id = self.state.handles.insert(kind, raw, parent)?;
        self.acquired.push(id);
        Ok(Some(id))
    }

    pub fn raw(&self, id: HandleId) -> Result<RawHandle> {
        self.state.handles.raw(id)
    }

    pub fn engine(&mut self) -> &mut dyn NativeEngine {
        self.state.engine.as_mut()
    }

    /// Keep `id` alive past the end of the scope.
    pub fn keep(&mut self, id: HandleId) {
        self.acquired.retain(|held| *held != id);
    }

    /// Hand `id` over to the engine; it is neither kept nor released.
    pub fn transfer(&mut self, id: HandleId) -> Option<RawHandle> {
        self.acquired.retain(|held| *held != id);
        self.state.handles.detach(id)
    }

    /// Release `id` now instead of at the end of the scope.
    pub fn release(&mut self, id: HandleId) -> usize {
        self.acquired.retain(|held| *held != id);
        let EngineState {
            engine, handles, ..
        } = &mut *self.state;
        handles.release(engine.as_mut(), id)
    }
}

impl Drop for HandleScope<'_> {
    fn drop(&mut self) {
        let EngineState {
            engine, handles, ..
        } = &mut *self.state;
        while let Some(id) = self.acquired.pop() {
            handles.release(engine.as_mut(), id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryEngine;

    fn arena_with_root() -> (HandleArena, HandleId) {
        let mut arena = HandleArena::new();
        let root = arena.insert_root(HandleKind::Library, RawHandle::NULL);
        (arena, root)
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut engine = MemoryEngine::new();
        let (mut arena, root) = arena_with_root();
        let doc = arena
            .insert(HandleKind::Document, RawHandle::new(10), root)
            .unwrap();

        assert_eq!(arena.release(&mut engine, doc), 1);
        assert_eq!(arena.release(&mut engine, doc), 0);
        assert!(matches!(arena.raw(doc), Err(PdfError::SessionDisposed)));
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn test_children_released_newest_first() {
        let mut engine = MemoryEngine::new();
        let probe = engine.probe();
        let (mut arena, root) = arena_with_root();
        let doc = arena
            .insert(HandleKind::Document, RawHandle::new(10), root)
            .unwrap();
        let page = arena
            .insert(HandleKind::Page, RawHandle::new(11), doc)
            .unwrap();
        arena
            .insert(HandleKind::TextPage, RawHandle::new(12), page)
            .unwrap();
        arena
            .insert(HandleKind::Bitmap, RawHandle::new(13), doc)
            .unwrap();

        assert_eq!(arena.release(&mut engine, doc), 4);
        assert_eq!(
            probe.release_log(),
            vec![
                (HandleKind::Bitmap, 13),
                (HandleKind::TextPage, 12),
                (HandleKind::Page, 11),
                (HandleKind::Document, 10),
            ]
        );
    }

    #[test]
    fn test_insert_under_dead_parent_fails() {
        let mut engine = MemoryEngine::new();
        let (mut arena, root) = arena_with_root();
        let doc = arena
            .insert(HandleKind::Document, RawHandle::new(10), root)
            .unwrap();
        arena.release(&mut engine, doc);
        assert!(matches!(
            arena.insert(HandleKind::Page, RawHandle::new(11), doc),
            Err(PdfError::SessionDisposed)
        ));
    }

    #[test]
    fn test_detach_forgets_without_closing() {
        let mut engine = MemoryEngine::new();
        let probe = engine.probe();
        let (mut arena, root) = arena_with_root();
        let obj = arena
            .insert(HandleKind::PageObject, RawHandle::new(20), root)
            .unwrap();
        assert_eq!(arena.detach(obj), Some(RawHandle::new(20)));
        assert_eq!(arena.release(&mut engine, obj), 0);
        assert!(probe.release_log().is_empty());
    }
}
