//! Window Module
//!
//! The managed window entity: identity, backing surface, tracked geometry,
//! border and the Normal/Minimized/Maximized/Fullscreen state machine.
//! Shell and compat windows share this struct; the few places where they
//! differ match on [`WindowKind`].

use tracing::debug;

use crate::backend::{Backend, SurfaceBinding, SurfaceKey};
use crate::shared::{Geometry, WindowId, WindowKind, WindowState};
use crate::wm::decorations::{Border, BorderStyle};

/// App id reported to the taskbar when the client never set one
pub const NO_APP_ID: &str = "NO_APP_ID";
/// Title reported to the taskbar when the client never set one
pub const NO_TITLE: &str = "NO_TITLE";

/// A toplevel window known to the compositor
#[derive(Debug)]
pub struct Window {
    pub id: WindowId,
    pub kind: WindowKind,
    pub surface: SurfaceKey,

    pub app_id: Option<String>,
    pub title: Option<String>,

    /// Last known geometry box in layout coordinates
    pub geometry: Geometry,

    /// Geometry box captured before maximize/fullscreen
    pub saved_geometry: Option<Geometry>,

    state: WindowState,

    /// State to return to when unminimized
    restore_state: WindowState,

    pub border: Option<Border>,

    /// Is the surface mapped?
    pub mapped: bool,

    /// Is the window currently focused?
    pub focused: bool,

    /// Routes surface events here until the window is dropped
    _binding: SurfaceBinding,
}

impl Window {
    pub fn new(
        id: WindowId,
        kind: WindowKind,
        binding: SurfaceBinding,
        title: Option<String>,
        app_id: Option<String>,
        geometry: Geometry,
    ) -> Self {
        Self {
            id,
            kind,
            surface: binding.surface(),
            app_id,
            title,
            geometry,
            saved_geometry: None,
            state: WindowState::Normal,
            restore_state: WindowState::Normal,
            border: None,
            mapped: false,
            focused: false,
            _binding: binding,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_managed(&self) -> bool {
        self.kind.is_managed()
    }

    pub fn is_minimized(&self) -> bool {
        self.state == WindowState::Minimized
    }

    pub fn app_id_or_default(&self) -> &str {
        self.app_id.as_deref().unwrap_or(NO_APP_ID)
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(NO_TITLE)
    }

    /// Geometry box in layout coordinates: node position plus the surface's
    /// internal geometry offset
    pub fn layout_box<B: Backend>(&self, backend: &B) -> Geometry {
        let node = backend.node_position(self.surface);
        backend.surface_geometry(self.surface).translated(node.x, node.y)
    }

    /// Re-read the geometry box from the backend
    pub fn sync_geometry<B: Backend>(&mut self, backend: &B) {
        self.geometry = self.layout_box(backend);
    }

    /// Put the geometry box exactly at `target` (layout coordinates)
    pub fn place<B: Backend>(&mut self, backend: &mut B, target: Geometry) {
        if self.kind.is_compat() {
            backend.configure(self.surface, target);
        } else {
            let offset = backend.surface_geometry(self.surface);
            backend.set_node_position(self.surface, target.x - offset.x, target.y - offset.y);
            backend.set_size(self.surface, target.width, target.height);
        }
        self.geometry = target;
        self.refresh_border(backend);
    }

    /// Move the scene node to `(x, y)` keeping the size
    pub fn move_node<B: Backend>(&mut self, backend: &mut B, x: i32, y: i32) {
        if self.kind.is_compat() {
            let size = backend.surface_geometry(self.surface);
            backend.configure(self.surface, Geometry::new(x, y, size.width, size.height));
        } else {
            backend.set_node_position(self.surface, x, y);
        }
        self.sync_geometry(backend);
    }

    /// Change the size keeping the node position
    pub fn resize<B: Backend>(&mut self, backend: &mut B, width: i32, height: i32) {
        if self.kind.is_compat() {
            let node = backend.node_position(self.surface);
            backend.configure(self.surface, Geometry::new(node.x, node.y, width, height));
        } else {
            backend.set_size(self.surface, width, height);
        }
        self.sync_geometry(backend);
        self.refresh_border(backend);
    }

    // ------------------------------------------------------------------
    // Border
    // ------------------------------------------------------------------

    /// Create and draw the border. Unmanaged and fullscreen windows stay
    /// undecorated.
    pub fn create_border<B: Backend>(&mut self, backend: &mut B, style: &BorderStyle) {
        if !self.is_managed() || self.state == WindowState::Fullscreen {
            return;
        }
        let size = backend.surface_geometry(self.surface);
        let border = Border::around(
            size.width,
            size.height,
            style.width,
            style.color(self.focused),
        );
        backend.draw_border(self.surface, &border);
        self.border = Some(border);
    }

    pub fn destroy_border<B: Backend>(&mut self, backend: &mut B) {
        if self.border.take().is_some() {
            backend.remove_border(self.surface);
        }
    }

    /// Fit an existing border to the current size
    fn refresh_border<B: Backend>(&mut self, backend: &mut B) {
        let size = backend.surface_geometry(self.surface);
        if let Some(border) = self.border.as_mut() {
            border.fit(size.width, size.height);
            backend.draw_border(self.surface, border);
        }
    }

    /// Apply focus: border palette, activation and keyboard focus
    pub fn set_focused<B: Backend>(&mut self, backend: &mut B, focused: bool, style: &BorderStyle) {
        self.focused = focused;

        if let Some(border) = self.border.as_mut() {
            border.color = style.color(focused);
            backend.draw_border(self.surface, border);
        }

        if self.is_managed() {
            backend.set_activated(self.surface, focused);
            if focused {
                backend.keyboard_enter(self.surface);
            }
        }
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Fill `area` (the usable part of the active output).
    ///
    /// Entering from Normal snapshots the geometry box. Entering from
    /// Fullscreen keeps the existing snapshot and brings the border back.
    pub fn maximize<B: Backend>(&mut self, backend: &mut B, area: Geometry, style: &BorderStyle) -> bool {
        self.unminimize(backend);
        match self.state {
            WindowState::Maximized => return false,
            WindowState::Normal => self.saved_geometry = Some(self.layout_box(backend)),
            _ => {}
        }

        self.state = WindowState::Maximized;
        self.place(backend, area);
        if self.border.is_none() {
            self.create_border(backend, style);
        }
        debug!("Window {} maximized to {:?}", self.id, area);
        true
    }

    /// Return from Maximized to the saved geometry
    pub fn unmaximize<B: Backend>(&mut self, backend: &mut B) -> bool {
        if self.state != WindowState::Maximized {
            return false;
        }
        self.state = WindowState::Normal;
        self.restore_saved(backend);
        debug!("Window {} unmaximized to {:?}", self.id, self.geometry);
        true
    }

    /// Cover the whole output `area`, undecorated
    pub fn fullscreen<B: Backend>(&mut self, backend: &mut B, area: Geometry) -> bool {
        self.unminimize(backend);
        match self.state {
            WindowState::Fullscreen => return false,
            WindowState::Normal => self.saved_geometry = Some(self.layout_box(backend)),
            _ => {}
        }

        self.state = WindowState::Fullscreen;
        self.destroy_border(backend);
        self.place(backend, area);
        debug!("Window {} fullscreen on {:?}", self.id, area);
        true
    }

    /// Leave Fullscreen for Normal, restoring geometry and border
    pub fn unfullscreen<B: Backend>(&mut self, backend: &mut B, style: &BorderStyle) -> bool {
        if self.state != WindowState::Fullscreen {
            return false;
        }
        self.state = WindowState::Normal;
        self.restore_saved(backend);
        self.create_border(backend, style);
        debug!("Window {} left fullscreen", self.id);
        true
    }

    /// Leave Fullscreen and Maximized, in that order
    pub fn make_normal<B: Backend>(&mut self, backend: &mut B, style: &BorderStyle) {
        self.unfullscreen(backend, style);
        self.unmaximize(backend);
    }

    fn restore_saved<B: Backend>(&mut self, backend: &mut B) {
        if let Some(saved) = self.saved_geometry.take() {
            self.place(backend, saved);
        }
    }

    /// Hide the surface, remembering the current state
    pub fn minimize<B: Backend>(&mut self, backend: &mut B) -> bool {
        if self.state == WindowState::Minimized {
            return false;
        }
        self.restore_state = self.state;
        self.state = WindowState::Minimized;
        backend.set_visible(self.surface, false);
        debug!("Window {} minimized from {:?}", self.id, self.restore_state);
        true
    }

    /// Show the surface again in the state it was minimized from
    pub fn unminimize<B: Backend>(&mut self, backend: &mut B) -> bool {
        if self.state != WindowState::Minimized {
            return false;
        }
        self.state = self.restore_state;
        backend.set_visible(self.surface, true);
        debug!("Window {} restored to {:?}", self.id, self.state);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEvent, HeadlessBackend, SurfaceBindings};

    const USABLE: Geometry = Geometry {
        x: 0,
        y: 0,
        width: 1920,
        height: 1030,
    };
    const FULL: Geometry = Geometry {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    };

    fn setup(kind: WindowKind, geometry: Geometry) -> (HeadlessBackend, SurfaceBindings, Window) {
        let mut backend = HeadlessBackend::new();
        let bindings = SurfaceBindings::new();
        backend.observe(&BackendEvent::NewToplevel {
            surface: SurfaceKey(1),
            kind,
            title: None,
            app_id: None,
            geometry,
        });
        backend.observe(&BackendEvent::Map { surface: SurfaceKey(1) });
        let binding = bindings.bind(SurfaceKey(1), WindowId(1));
        let mut window = Window::new(WindowId(1), kind, binding, None, None, geometry);
        window.mapped = true;
        window.create_border(&mut backend, &BorderStyle::default());
        (backend, bindings, window)
    }

    #[test]
    fn test_maximize_round_trip() {
        let start = Geometry::new(10, 10, 200, 150);
        let (mut backend, _bindings, mut window) = setup(WindowKind::ShellManaged, start);
        let style = BorderStyle::default();

        assert!(window.maximize(&mut backend, USABLE, &style));
        assert_eq!(window.state(), WindowState::Maximized);
        assert_eq!(window.geometry, Geometry::new(0, 0, 1920, 1030));
        assert_eq!(window.saved_geometry, Some(start));
        assert_eq!(window.border.map(|b| b.right.x), Some(1920));

        assert!(window.unmaximize(&mut backend));
        assert_eq!(window.state(), WindowState::Normal);
        assert_eq!(window.layout_box(&backend), start);
        assert_eq!(window.saved_geometry, None);
    }

    #[test]
    fn test_fullscreen_drops_and_restores_border() {
        let start = Geometry::new(40, 30, 300, 200);
        let (mut backend, _bindings, mut window) = setup(WindowKind::ShellManaged, start);
        let style = BorderStyle::default();

        assert!(window.fullscreen(&mut backend, FULL));
        assert!(window.border.is_none());
        assert!(backend.surface(SurfaceKey(1)).unwrap().border.is_none());
        assert_eq!(window.layout_box(&backend), FULL);

        assert!(window.unfullscreen(&mut backend, &style));
        assert!(window.border.is_some());
        assert_eq!(window.layout_box(&backend), start);
    }

    #[test]
    fn test_fullscreen_from_maximized_keeps_first_snapshot() {
        let start = Geometry::new(5, 5, 100, 100);
        let (mut backend, _bindings, mut window) = setup(WindowKind::ShellManaged, start);
        let style = BorderStyle::default();

        window.maximize(&mut backend, USABLE, &style);
        window.fullscreen(&mut backend, FULL);
        assert_eq!(window.saved_geometry, Some(start));

        // Maximize from fullscreen brings the border back
        window.maximize(&mut backend, USABLE, &style);
        assert!(window.border.is_some());
        assert_eq!(window.state(), WindowState::Maximized);

        window.make_normal(&mut backend, &style);
        assert_eq!(window.state(), WindowState::Normal);
        assert_eq!(window.layout_box(&backend), start);
    }

    #[test]
    fn test_restore_honours_geometry_offset() {
        let (mut backend, _bindings, mut window) =
            setup(WindowKind::ShellManaged, Geometry::new(90, 90, 300, 200));
        // Client-side shadow: the box starts 10 units inside the node
        backend.set_geometry_offset(SurfaceKey(1), 10, 10);
        let before = window.layout_box(&backend);
        assert_eq!(before, Geometry::new(100, 100, 300, 200));

        window.maximize(&mut backend, USABLE, &BorderStyle::default());
        assert_eq!(window.layout_box(&backend), USABLE);
        assert_eq!(backend.node_position(SurfaceKey(1)), crate::shared::Point::new(-10, -10));

        window.unmaximize(&mut backend);
        assert_eq!(window.layout_box(&backend), before);
        assert_eq!(backend.node_position(SurfaceKey(1)), crate::shared::Point::new(90, 90));
    }

    #[test]
    fn test_minimize_remembers_state() {
        let (mut backend, _bindings, mut window) =
            setup(WindowKind::ShellManaged, Geometry::new(0, 0, 100, 100));
        window.maximize(&mut backend, USABLE, &BorderStyle::default());

        assert!(window.minimize(&mut backend));
        assert!(!window.minimize(&mut backend));
        assert_eq!(window.state(), WindowState::Minimized);
        assert!(!backend.surface(SurfaceKey(1)).unwrap().visible);

        assert!(window.unminimize(&mut backend));
        assert_eq!(window.state(), WindowState::Maximized);
        assert!(backend.surface(SurfaceKey(1)).unwrap().visible);
    }

    #[test]
    fn test_compat_window_uses_configure() {
        let start = Geometry::new(20, 20, 200, 100);
        let (mut backend, _bindings, mut window) = setup(WindowKind::CompatManaged, start);
        window.maximize(&mut backend, USABLE, &BorderStyle::default());
        let surface = backend.surface(SurfaceKey(1)).unwrap();
        assert_eq!(surface.node, crate::shared::Point::new(0, 0));
        assert_eq!(surface.geometry, Geometry::new(0, 0, 1920, 1030));

        window.unmaximize(&mut backend);
        assert_eq!(window.layout_box(&backend), start);
    }

    #[test]
    fn test_unmanaged_window_gets_no_border() {
        let (backend, _bindings, window) =
            setup(WindowKind::CompatUnmanaged, Geometry::new(0, 0, 50, 50));
        assert!(window.border.is_none());
        assert!(backend.surface(SurfaceKey(1)).unwrap().border.is_none());
    }
}
