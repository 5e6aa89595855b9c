//! Headless backend
//!
//! An in-memory scene: surfaces with a node position, a geometry box, a
//! visibility flag and a stacking order. It follows the event stream it is
//! fed (see [`HeadlessBackend::observe`]) and records everything the window
//! manager asks of it, which is what the tests assert on. The `kestrel`
//! binary drives it from a newline-delimited JSON event script.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::process::{Child, Command};
use tracing::{debug, info, trace, warn};

use super::{Backend, BackendEvent, SurfaceKey};
use crate::shared::{Geometry, Point};
use crate::wm::decorations::Border;

/// Size given to surfaces that arrive without one
const DEFAULT_SIZE: (i32, i32) = (640, 480);

/// One surface in the headless scene
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSurface {
    /// Scene node position in layout coordinates
    pub node: Point,
    /// Geometry box relative to the node, with the current size
    pub geometry: Geometry,
    pub mapped: bool,
    pub visible: bool,
    pub activated: bool,
    pub border: Option<Border>,
    pub close_requested: bool,
}

impl HeadlessSurface {
    fn new(geometry: Geometry) -> Self {
        let (width, height) = if geometry.width > 0 && geometry.height > 0 {
            (geometry.width, geometry.height)
        } else {
            DEFAULT_SIZE
        };
        Self {
            node: Point::new(geometry.x, geometry.y),
            geometry: Geometry::new(0, 0, width, height),
            mapped: false,
            visible: true,
            activated: false,
            border: None,
            close_requested: false,
        }
    }

    /// Geometry box in layout coordinates
    pub fn layout_box(&self) -> Geometry {
        self.geometry.translated(self.node.x, self.node.y)
    }
}

/// Backend with no display attached
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    surfaces: HashMap<SurfaceKey, HeadlessSurface>,
    /// Bottom to top
    stack: Vec<SurfaceKey>,
    keyboard_focus: Option<SurfaceKey>,
    pointer_focus: Option<SurfaceKey>,
    /// Buttons and keys that reached clients
    pub forwarded_buttons: Vec<(u32, bool)>,
    pub forwarded_keys: Vec<(u32, bool)>,
    /// Every spawn request, as `program arg...`
    pub spawned: Vec<String>,
    /// Start real processes for spawn requests
    launch_processes: bool,
    children: Vec<Child>,
}

impl HeadlessBackend {
    /// Backend that only records spawn requests
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that starts a real process for every spawn request
    pub fn with_processes() -> Self {
        // No functional update syntax: the backend implements Drop
        let mut backend = Self::default();
        backend.launch_processes = true;
        backend
    }

    /// Follow surface lifecycle events before they are dispatched to the
    /// window manager
    pub fn observe(&mut self, event: &BackendEvent) {
        match event {
            BackendEvent::NewToplevel {
                surface, geometry, ..
            } => {
                self.surfaces.insert(*surface, HeadlessSurface::new(*geometry));
            }
            BackendEvent::Map { surface } => {
                if let Some(state) = self.surfaces.get_mut(surface) {
                    state.mapped = true;
                    if !self.stack.contains(surface) {
                        self.stack.push(*surface);
                    }
                }
            }
            BackendEvent::Unmap { surface } => {
                if let Some(state) = self.surfaces.get_mut(surface) {
                    state.mapped = false;
                }
                self.drop_focus(*surface);
            }
            BackendEvent::Destroy { surface } => {
                self.surfaces.remove(surface);
                self.stack.retain(|s| s != surface);
                self.drop_focus(*surface);
            }
            _ => {}
        }
    }

    fn drop_focus(&mut self, surface: SurfaceKey) {
        if self.keyboard_focus == Some(surface) {
            self.keyboard_focus = None;
        }
        if self.pointer_focus == Some(surface) {
            self.pointer_focus = None;
        }
    }

    #[cfg(test)]
    pub fn surface(&self, surface: SurfaceKey) -> Option<&HeadlessSurface> {
        self.surfaces.get(&surface)
    }

    /// Surface on top of the stacking order
    #[cfg(test)]
    pub fn top(&self) -> Option<SurfaceKey> {
        self.stack.last().copied()
    }

    /// Client-side decorations: move the geometry box inside the node
    #[cfg(test)]
    pub fn set_geometry_offset(&mut self, surface: SurfaceKey, x: i32, y: i32) {
        if let Some(state) = self.surface_mut(surface) {
            state.geometry.x = x;
            state.geometry.y = y;
        }
    }

    #[cfg(test)]
    pub fn keyboard_focus(&self) -> Option<SurfaceKey> {
        self.keyboard_focus
    }

    fn surface_mut(&mut self, surface: SurfaceKey) -> Option<&mut HeadlessSurface> {
        let state = self.surfaces.get_mut(&surface);
        if state.is_none() {
            debug!("Request for unknown surface {:?}", surface);
        }
        state
    }
}

impl Backend for HeadlessBackend {
    fn surface_geometry(&self, surface: SurfaceKey) -> Geometry {
        self.surfaces
            .get(&surface)
            .map(|s| s.geometry)
            .unwrap_or_default()
    }

    fn node_position(&self, surface: SurfaceKey) -> Point {
        self.surfaces
            .get(&surface)
            .map(|s| s.node)
            .unwrap_or_default()
    }

    fn set_node_position(&mut self, surface: SurfaceKey, x: i32, y: i32) {
        if let Some(state) = self.surface_mut(surface) {
            state.node = Point::new(x, y);
        }
    }

    fn set_size(&mut self, surface: SurfaceKey, width: i32, height: i32) {
        // Clients here ack every configure right away
        if let Some(state) = self.surface_mut(surface) {
            state.geometry.width = width;
            state.geometry.height = height;
        }
    }

    fn configure(&mut self, surface: SurfaceKey, geometry: Geometry) {
        if let Some(state) = self.surface_mut(surface) {
            state.node = Point::new(geometry.x, geometry.y);
            state.geometry = Geometry::new(0, 0, geometry.width, geometry.height);
        }
    }

    fn raise_to_top(&mut self, surface: SurfaceKey) {
        self.stack.retain(|s| *s != surface);
        self.stack.push(surface);
    }

    fn set_visible(&mut self, surface: SurfaceKey, visible: bool) {
        if let Some(state) = self.surface_mut(surface) {
            state.visible = visible;
        }
    }

    fn set_activated(&mut self, surface: SurfaceKey, activated: bool) {
        if let Some(state) = self.surface_mut(surface) {
            if state.activated != activated {
                trace!("Surface {:?} activated: {}", surface, activated);
                state.activated = activated;
            }
        }
    }

    fn keyboard_enter(&mut self, surface: SurfaceKey) {
        self.keyboard_focus = Some(surface);
    }

    fn pointer_focus(&self) -> Option<SurfaceKey> {
        self.pointer_focus
    }

    fn pointer_enter(&mut self, surface: SurfaceKey, _local: Point) {
        self.pointer_focus = Some(surface);
    }

    fn clear_pointer_focus(&mut self) {
        self.pointer_focus = None;
    }

    fn forward_button(&mut self, button: u32, pressed: bool) {
        self.forwarded_buttons.push((button, pressed));
    }

    fn forward_key(&mut self, keycode: u32, pressed: bool) {
        self.forwarded_keys.push((keycode, pressed));
    }

    fn surface_at(&self, point: Point) -> Option<(SurfaceKey, Point)> {
        self.stack.iter().rev().find_map(|key| {
            let state = self.surfaces.get(key)?;
            let area = state.layout_box();
            if state.mapped && state.visible && area.contains(point) {
                Some((*key, Point::new(point.x - area.x, point.y - area.y)))
            } else {
                None
            }
        })
    }

    fn draw_border(&mut self, surface: SurfaceKey, border: &Border) {
        if let Some(state) = self.surface_mut(surface) {
            if state.border.is_none() {
                trace!("Border created for {:?}", surface);
            }
            state.border = Some(*border);
        }
    }

    fn remove_border(&mut self, surface: SurfaceKey) {
        if let Some(state) = self.surface_mut(surface) {
            state.border = None;
        }
    }

    fn send_close(&mut self, surface: SurfaceKey) {
        if let Some(state) = self.surface_mut(surface) {
            if state.close_requested {
                debug!("Surface {:?} already asked to close", surface);
            }
            state.close_requested = true;
        }
    }

    fn spawn(&mut self, program: &str, args: &[String]) -> Result<()> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.spawned.push(line);

        if !self.launch_processes {
            return Ok(());
        }

        let child = Command::new(program)
            .args(args)
            .spawn()
            .with_context(|| format!("Failed to launch {}", program))?;
        info!("Launched {} (pid {})", program, child.id());
        self.children.push(child);
        Ok(())
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        for child in self.children.iter_mut() {
            if let Err(e) = child.kill() {
                warn!("Failed to stop child {}: {}", child.id(), e);
            }
            let _ = child.wait();
        }
    }
}
