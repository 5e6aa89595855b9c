//! Backend Module
//!
//! The seam between the window manager and the windowing library that owns
//! the display protocol, the scene graph and the input devices. The window
//! manager only sees surfaces through [`SurfaceKey`] handles, receives
//! [`BackendEvent`]s and calls back through the [`Backend`] trait.

pub mod binding;
pub mod headless;

pub use binding::{SurfaceBinding, SurfaceBindings};
pub use headless::HeadlessBackend;

use anyhow::Result;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::shared::{Geometry, Point, WindowKind};
use crate::wm::decorations::Border;

/// Left pointer button (evdev code)
pub const BTN_LEFT: u32 = 0x110;
/// Right pointer button (evdev code)
pub const BTN_RIGHT: u32 = 0x111;

/// Opaque handle of a toplevel surface owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceKey(pub u64);

bitflags! {
    /// Keyboard modifier state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CAPS  = 1 << 1;
        const CTRL  = 1 << 2;
        const ALT   = 1 << 3;
        const MOD2  = 1 << 4;
        const MOD3  = 1 << 5;
        const LOGO  = 1 << 6;
        const MOD5  = 1 << 7;
    }
}

bitflags! {
    /// Edges dragged by an interactive resize. Empty means free resize
    /// from the bottom-right corner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResizeEdges: u32 {
        const TOP    = 1;
        const BOTTOM = 2;
        const LEFT   = 4;
        const RIGHT  = 8;
    }
}

/// Events delivered by the windowing library, in delivery order.
///
/// The serialized form (one JSON object per line, tagged by `event`) is what
/// the headless backend reads from its event script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackendEvent {
    /// A display output was plugged in
    NewOutput { name: String, width: i32, height: i32 },

    /// An output changed its effective resolution
    OutputChanged { name: String, width: i32, height: i32 },

    /// A new toplevel surface exists (not yet mapped)
    NewToplevel {
        surface: SurfaceKey,
        kind: WindowKind,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        app_id: Option<String>,
        /// Initial geometry box (compat windows carry their requested position)
        #[serde(default)]
        geometry: Geometry,
    },

    Map { surface: SurfaceKey },
    Unmap { surface: SurfaceKey },
    Destroy { surface: SurfaceKey },

    /// Client asks for an interactive move
    RequestMove { surface: SurfaceKey },

    /// Client asks for an interactive resize on `edges` (see [`ResizeEdges`])
    RequestResize { surface: SurfaceKey, edges: u32 },

    RequestMaximize { surface: SurfaceKey },
    RequestFullscreen { surface: SurfaceKey },
    RequestMinimize { surface: SurfaceKey },

    SetTitle { surface: SurfaceKey, title: String },
    SetAppId { surface: SurfaceKey, app_id: String },

    /// Compat window asks to be activated
    RequestActivate { surface: SurfaceKey },

    /// Compat window asks for a geometry
    RequestConfigure { surface: SurfaceKey, geometry: Geometry },

    /// Absolute cursor position in layout coordinates
    PointerMotion { x: i32, y: i32 },

    PointerButton { button: u32, pressed: bool },

    /// Key with its resolved keysym name (`"Escape"`, `"h"`, `"Alt_L"`, ...)
    Key {
        keycode: u32,
        keysym: String,
        pressed: bool,
    },

    /// Modifier state update (bits of [`Modifiers`])
    Modifiers { modifiers: u32 },
}

/// Operations the window manager needs from the windowing library
pub trait Backend {
    /// Internal geometry box of a surface: offset relative to its scene node
    /// plus the current size
    fn surface_geometry(&self, surface: SurfaceKey) -> Geometry;

    /// Scene node position in layout coordinates
    fn node_position(&self, surface: SurfaceKey) -> Point;

    fn set_node_position(&mut self, surface: SurfaceKey, x: i32, y: i32);

    /// Request a new size from a shell surface
    fn set_size(&mut self, surface: SurfaceKey, width: i32, height: i32);

    /// Position and size a compat surface in one request
    fn configure(&mut self, surface: SurfaceKey, geometry: Geometry);

    fn raise_to_top(&mut self, surface: SurfaceKey);

    fn set_visible(&mut self, surface: SurfaceKey, visible: bool);

    fn set_activated(&mut self, surface: SurfaceKey, activated: bool);

    /// Give keyboard focus, forwarding the currently held keys and modifiers
    fn keyboard_enter(&mut self, surface: SurfaceKey);

    /// Root toplevel surface currently holding pointer focus
    fn pointer_focus(&self) -> Option<SurfaceKey>;

    /// Give pointer focus to a surface at a surface-local position
    fn pointer_enter(&mut self, surface: SurfaceKey, local: Point);

    fn clear_pointer_focus(&mut self);

    fn forward_button(&mut self, button: u32, pressed: bool);

    fn forward_key(&mut self, keycode: u32, pressed: bool);

    /// Topmost visible surface under a layout point, with the surface-local
    /// position
    fn surface_at(&self, point: Point) -> Option<(SurfaceKey, Point)>;

    fn draw_border(&mut self, surface: SurfaceKey, border: &Border);

    fn remove_border(&mut self, surface: SurfaceKey);

    /// Politely ask the client to close
    fn send_close(&mut self, surface: SurfaceKey);

    /// Start a child process connected to this display
    fn spawn(&mut self, program: &str, args: &[String]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_script_format() {
        let line = r#"{"event":"new_toplevel","surface":3,"kind":"shell_managed","title":"Terminal"}"#;
        let event: BackendEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            event,
            BackendEvent::NewToplevel {
                surface: SurfaceKey(3),
                kind: WindowKind::ShellManaged,
                title: Some("Terminal".into()),
                app_id: None,
                geometry: Geometry::default(),
            }
        );
    }

    #[test]
    fn test_resize_edges_from_protocol_bits() {
        let edges = ResizeEdges::from_bits_truncate(1 | 8 | 64);
        assert_eq!(edges, ResizeEdges::TOP | ResizeEdges::RIGHT);
    }
}
