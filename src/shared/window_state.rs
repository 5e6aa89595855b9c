//! Window state value types
//!
//! Plain data shared by the window manager, the interaction state machine and
//! the backend seam. Nothing here talks to the backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-local window identifier.
///
/// Minted from a monotonically increasing counter and never reused, so it is
/// safe to hand to the taskbar as a correlation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point in output-layout coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Same box moved by `(dx, dy)`
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

/// Window display state. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    Fullscreen,
}

/// Backing surface flavour of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Native shell toplevel
    ShellManaged,
    /// Compatibility (X11 bridge) window handled by the window manager
    CompatManaged,
    /// Override-redirect compatibility window; never bordered or focused
    CompatUnmanaged,
}

impl WindowKind {
    /// Kinds that get borders, focus and a taskbar icon
    pub fn is_managed(&self) -> bool {
        !matches!(self, WindowKind::CompatUnmanaged)
    }

    pub fn is_compat(&self) -> bool {
        matches!(self, WindowKind::CompatManaged | WindowKind::CompatUnmanaged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_edges() {
        let geo = Geometry::new(10, 20, 300, 200);
        assert_eq!(geo.right(), 310);
        assert_eq!(geo.bottom(), 220);
        assert!(geo.contains(Point::new(10, 20)));
        assert!(!geo.contains(Point::new(310, 20)));
        assert_eq!(geo.translated(-10, 5), Geometry::new(0, 25, 300, 200));
    }

    #[test]
    fn test_only_unmanaged_kind_is_unmanaged() {
        assert!(WindowKind::ShellManaged.is_managed());
        assert!(WindowKind::CompatManaged.is_managed());
        assert!(!WindowKind::CompatUnmanaged.is_managed());
        assert!(!WindowKind::ShellManaged.is_compat());
    }
}
