//! Process-wide serialization of native calls
//!
//! The engine keeps global cursor and cache state, so even read-only calls
//! such as page counts must never overlap. [`GlobalEngineGate`] owns the
//! engine behind a single mutex; the engine is only reachable from inside
//! [`GlobalEngineGate::with_engine`].
//!
//! Public operations take the gate exactly once and release it before
//! returning. Composite operations call those leaf operations one after
//! another instead of nesting them, so the gate is never held across a
//! call into another public entry point. A nested entry from the same
//! thread is reported as [`PdfError::GateReentered`] instead of
//! deadlocking.

use crate::engine::{NativeEngine, RawHandle};
use crate::error::{PdfError, Result};
use crate::handle::{HandleArena, HandleId, HandleKind, HandleScope};
use std::cell::Cell;
use std::sync::{Mutex, MutexGuard};

thread_local! {
    static GATE_HELD: Cell<bool> = const { Cell::new(false) };
}

/// Clears the per-thread marker on every exit path, including unwinding.
struct HeldMarker;

impl HeldMarker {
    fn set() -> Result<Self> {
        if GATE_HELD.with(|held| held.replace(true)) {
            return Err(PdfError::GateReentered);
        }
        Ok(HeldMarker)
    }
}

impl Drop for HeldMarker {
    fn drop(&mut self) {
        GATE_HELD.with(|held| held.set(false));
    }
}

/// Engine plus the arena of every handle opened through it.
///
/// Only reachable while the gate is held.
pub struct EngineState {
    pub(crate) engine: Box<dyn NativeEngine>,
    pub(crate) handles: HandleArena,
    root: HandleId,
    active: bool,
}

impl EngineState {
    pub fn engine(&mut self) -> &mut dyn NativeEngine {
        self.engine.as_mut()
    }

    /// Handle standing for the library itself; parent of every document.
    pub fn root(&self) -> HandleId {
        self.root
    }

    pub fn raw(&self, id: HandleId) -> Result<RawHandle> {
        self.handles.raw(id)
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.handles.is_live(id)
    }

    /// Release `id` and its children. Idempotent.
    pub fn release(&mut self, id: HandleId) -> usize {
        self.handles.release(self.engine.as_mut(), id)
    }

    /// Start a scope whose unkept handles are released when it ends.
    pub fn scope(&mut self) -> HandleScope<'_> {
        HandleScope::new(self)
    }

    /// Live handles excluding the library root.
    pub fn live_handle_count(&self) -> usize {
        self.handles.live_count().saturating_sub(usize::from(self.active))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// The single mutual-exclusion gate in front of the native engine.
pub struct GlobalEngineGate {
    state: Mutex<EngineState>,
}

impl GlobalEngineGate {
    /// Initialize the engine and wrap it.
    pub(crate) fn open(mut engine: Box<dyn NativeEngine>) -> Self {
        engine.init_library();
        let mut handles = HandleArena::new();
        let root = handles.insert_root(HandleKind::Library, RawHandle::NULL);
        Self {
            state: Mutex::new(EngineState {
                engine,
                handles,
                root,
                active: true,
            }),
        }
    }

    /// Run `f` with exclusive access to the engine.
    ///
    /// The gate is released when `f` returns, fails or panics; errors pass
    /// through unchanged. Fails with [`PdfError::LibraryShutDown`] once the
    /// library has been shut down.
    pub fn with_engine<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineState) -> Result<T>,
    {
        self.with_state(|state| {
            if !state.active {
                return Err(PdfError::LibraryShutDown);
            }
            f(state)
        })
    }

    /// Like [`with_engine`](Self::with_engine) but also runs after
    /// shutdown, for release paths that must stay callable.
    pub(crate) fn with_state<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut EngineState) -> Result<T>,
    {
        let _marker = HeldMarker::set()?;
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Tear down every live handle, then the library. Idempotent.
    pub(crate) fn shutdown(&self) -> Result<bool> {
        self.with_state(|state| {
            if !state.active {
                return Ok(false);
            }
            let root = state.root;
            let closed = state.release(root);
            state.active = false;
            log::debug!("engine shut down, {} handle(s) closed", closed);
            Ok(true)
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            // The panicking call has already unwound out of the engine.
            log::warn!("engine gate was poisoned by a panic; recovering");
            poisoned.into_inner()
        })
    }
}

/// True while the current thread is inside the gate.
pub fn gate_held_by_current_thread() -> bool {
    GATE_HELD.with(|held| held.get())
}
