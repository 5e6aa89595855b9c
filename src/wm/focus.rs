//! Focus Module
//!
//! The window registry: owns every window, mints window ids, and keeps the
//! focus order of mapped managed windows (most recently focused first) with
//! the currently focused window.
//!
//! Invariants:
//! - a window appears at most once in the focus order
//! - at most one window is focused, and if one is, it is first in the order
//! - unmanaged windows never enter the focus order and are never focused

use std::collections::HashMap;
use tracing::debug;

use crate::backend::{Backend, SurfaceBinding};
use crate::shared::{Geometry, WindowId, WindowKind};
use crate::wm::decorations::BorderStyle;
use crate::wm::window::Window;

/// Registry of windows plus the focus tracker
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: HashMap<WindowId, Window>,

    /// Mapped managed windows, most recently focused first
    order: Vec<WindowId>,

    /// Currently focused window
    focused: Option<WindowId>,

    /// Last id handed out; ids are never reused
    last_id: u64,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh window id
    pub fn next_id(&mut self) -> WindowId {
        self.last_id += 1;
        WindowId(self.last_id)
    }

    /// Create a window for a new toplevel surface
    pub fn create(
        &mut self,
        kind: WindowKind,
        binding: impl FnOnce(WindowId) -> SurfaceBinding,
        title: Option<String>,
        app_id: Option<String>,
        geometry: Geometry,
    ) -> WindowId {
        let id = self.next_id();
        let window = Window::new(id, kind, binding(id), title, app_id, geometry);
        debug!("Created window {} ({:?}) for surface {:?}", id, kind, window.surface);
        self.windows.insert(id, window);
        id
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    /// All windows, in no particular order
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    /// Focus order, most recently focused first
    pub fn order(&self) -> &[WindowId] {
        &self.order
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Add a mapped window to the back of the focus order. Callers focus it
    /// right after, which moves it to the front.
    pub fn insert_mapped(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        window.mapped = true;
        if !window.is_managed() || self.order.contains(&id) {
            return false;
        }
        self.order.push(id);
        true
    }

    /// Focus a window.
    ///
    /// No-op if it is already focused, unknown, unmapped or unmanaged.
    /// Otherwise the previous window is unfocused, the window is unminimized
    /// if needed, moved to the front of the order, raised, and activated.
    pub fn focus<B: Backend>(&mut self, id: WindowId, backend: &mut B, style: &BorderStyle) -> bool {
        if self.focused == Some(id) {
            return false;
        }
        match self.windows.get(&id) {
            Some(window) if window.is_managed() && window.mapped => {}
            _ => return false,
        }

        if let Some(previous) = self.focused.take() {
            if let Some(window) = self.windows.get_mut(&previous) {
                window.set_focused(backend, false, style);
            }
        }

        self.order.retain(|other| *other != id);
        self.order.insert(0, id);

        if let Some(window) = self.windows.get_mut(&id) {
            window.unminimize(backend);
            backend.raise_to_top(window.surface);
            window.set_focused(backend, true, style);
        }
        self.focused = Some(id);
        debug!("Focused window {}", id);
        true
    }

    /// Drop focus from a window if it holds it
    pub fn unfocus<B: Backend>(&mut self, id: WindowId, backend: &mut B, style: &BorderStyle) -> bool {
        if self.focused != Some(id) {
            return false;
        }
        self.focused = None;
        if let Some(window) = self.windows.get_mut(&id) {
            window.set_focused(backend, false, style);
        }
        debug!("Unfocused window {}", id);
        true
    }

    /// Minimize a window: hide it, drop its focus and move it to the back of
    /// the order. No other window is focused in its place.
    pub fn minimize<B: Backend>(&mut self, id: WindowId, backend: &mut B, style: &BorderStyle) -> bool {
        let minimized = match self.windows.get_mut(&id) {
            Some(window) if window.is_managed() => window.minimize(backend),
            _ => return false,
        };
        if !minimized {
            return false;
        }

        self.unfocus(id, backend, style);
        if self.order.contains(&id) {
            self.order.retain(|other| *other != id);
            self.order.push(id);
        }
        true
    }

    /// Take a window out of the focus order (unmap)
    pub fn withdraw<B: Backend>(&mut self, id: WindowId, backend: &mut B, style: &BorderStyle) {
        self.unfocus(id, backend, style);
        self.order.retain(|other| *other != id);
        if let Some(window) = self.windows.get_mut(&id) {
            window.mapped = false;
        }
    }

    /// Erase a window; the returned window still holds its surface binding
    pub fn remove(&mut self, id: WindowId) -> Option<Window> {
        self.order.retain(|other| *other != id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        let window = self.windows.remove(&id);
        if window.is_some() {
            debug!("Removed window {}", id);
        }
        window
    }

    /// Check the focus invariants
    pub fn is_consistent(&self) -> bool {
        let focused_flags: Vec<WindowId> = self
            .windows
            .values()
            .filter(|w| w.focused)
            .map(|w| w.id)
            .collect();

        let unique = self
            .order
            .iter()
            .enumerate()
            .all(|(i, id)| !self.order[i + 1..].contains(id));

        let focus_ok = match self.focused {
            Some(id) => focused_flags == [id] && self.order.first() == Some(&id),
            None => focused_flags.is_empty(),
        };

        unique && focus_ok
    }
}
