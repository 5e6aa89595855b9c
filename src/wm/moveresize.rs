//! MoveResize Module
//!
//! Interactive move and resize. [`Interaction`] is the cursor-mode state
//! machine (Passthrough, Moving, Resizing) with the grab captured at gesture
//! start; the geometry math is kept in free functions.

use tracing::debug;

use crate::backend::ResizeEdges;
use crate::shared::{Geometry, Point, WindowId};

/// Smallest width/height a free resize can produce
pub const MIN_FREE_RESIZE: i32 = 100;

/// What the pointer is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    #[default]
    Passthrough,
    Moving,
    Resizing,
}

/// Grab state of the current gesture
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    pub cursor_mode: CursorMode,

    /// Window under manipulation; only set while not in Passthrough
    pub grabbed: Option<WindowId>,

    /// Cursor minus the reference point captured at gesture start
    pub grab_offset: Point,

    /// Geometry box (layout coordinates) at gesture start
    pub grab_geometry: Geometry,

    pub resize_edges: ResizeEdges,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.cursor_mode != CursorMode::Passthrough
    }

    /// Start moving `window` whose scene node sits at `origin`
    pub fn begin_move(&mut self, window: WindowId, cursor: Point, origin: Point) {
        self.cursor_mode = CursorMode::Moving;
        self.grabbed = Some(window);
        self.grab_offset = Point::new(cursor.x - origin.x, cursor.y - origin.y);
        debug!("Move of window {} started, offset {:?}", window, self.grab_offset);
    }

    /// Start resizing `window` whose geometry box is `geometry` (layout
    /// coordinates).
    ///
    /// The offset is taken against the border being dragged: the far edge
    /// for RIGHT/BOTTOM, the near edge otherwise (free resize included).
    pub fn begin_resize(&mut self, window: WindowId, cursor: Point, geometry: Geometry, edges: ResizeEdges) {
        let border_x = if edges.contains(ResizeEdges::RIGHT) {
            geometry.right()
        } else {
            geometry.x
        };
        let border_y = if edges.contains(ResizeEdges::BOTTOM) {
            geometry.bottom()
        } else {
            geometry.y
        };

        self.cursor_mode = CursorMode::Resizing;
        self.grabbed = Some(window);
        self.grab_offset = Point::new(cursor.x - border_x, cursor.y - border_y);
        self.grab_geometry = geometry;
        self.resize_edges = edges;
        debug!(
            "Resize of window {} started, edges {:?}, grab {:?}",
            window, edges, geometry
        );
    }

    /// End the gesture where it is
    pub fn end(&mut self) -> Option<WindowId> {
        let grabbed = self.grabbed.take();
        self.cursor_mode = CursorMode::Passthrough;
        self.resize_edges = ResizeEdges::empty();
        grabbed
    }

    /// End the gesture if it targets `window` (window going away)
    pub fn release(&mut self, window: WindowId) -> bool {
        if self.grabbed != Some(window) {
            return false;
        }
        self.end();
        true
    }

    /// Where the dragged border is for a cursor position
    pub fn border_at(&self, cursor: Point) -> Point {
        Point::new(cursor.x - self.grab_offset.x, cursor.y - self.grab_offset.y)
    }
}

/// New size for a free (bottom-right) resize; each side floors at `min`
pub fn free_resize(grab: Geometry, border: Point, min: i32) -> (i32, i32) {
    let width = (grab.width + (border.x - grab.x)).max(min);
    let height = (grab.height + (border.y - grab.y)).max(min);
    (width, height)
}

/// New geometry box for an edge-directed resize.
///
/// Each dragged edge follows the border but stops one unit before the
/// opposite edge.
pub fn edge_resize(grab: Geometry, edges: ResizeEdges, border: Point) -> Geometry {
    let mut left = grab.x;
    let mut right = grab.right();
    let mut top = grab.y;
    let mut bottom = grab.bottom();

    if edges.contains(ResizeEdges::TOP) {
        top = border.y.min(bottom - 1);
    }
    if edges.contains(ResizeEdges::BOTTOM) {
        bottom = border.y.max(top + 1);
    }

    if edges.contains(ResizeEdges::LEFT) {
        left = border.x.min(right - 1);
    }
    if edges.contains(ResizeEdges::RIGHT) {
        right = border.x.max(left + 1);
    }

    Geometry::new(left, top, right - left, bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_resize_grows_with_cursor() {
        let mut interaction = Interaction::new();
        let grab = Geometry::new(0, 0, 300, 200);
        interaction.begin_resize(WindowId(1), Point::new(0, 0), grab, ResizeEdges::empty());
        assert_eq!(interaction.grab_offset, Point::new(0, 0));

        let border = interaction.border_at(Point::new(50, 30));
        assert_eq!(free_resize(grab, border, MIN_FREE_RESIZE), (350, 230));
    }

    #[test]
    fn test_free_resize_floor() {
        let grab = Geometry::new(100, 100, 300, 200);
        for (x, y) in [(-5000, -5000), (100, 100), (250, 90), (-1, 10_000)] {
            let (w, h) = free_resize(grab, Point::new(x, y), MIN_FREE_RESIZE);
            assert!(w >= MIN_FREE_RESIZE && h >= MIN_FREE_RESIZE, "{}x{}", w, h);
        }
    }

    #[test]
    fn test_free_resize_keeps_grab_offset() {
        // Pressed 20 units inside the window: no jump on the first motion
        let mut interaction = Interaction::new();
        let grab = Geometry::new(100, 100, 300, 200);
        interaction.begin_resize(WindowId(1), Point::new(120, 120), grab, ResizeEdges::empty());
        let border = interaction.border_at(Point::new(120, 120));
        assert_eq!(free_resize(grab, border, MIN_FREE_RESIZE), (300, 200));
    }

    #[test]
    fn test_top_edge_clamps_before_bottom() {
        let grab = Geometry::new(0, 0, 300, 200);
        let result = edge_resize(grab, ResizeEdges::TOP, Point::new(0, 250));
        assert_eq!(result, Geometry::new(0, 199, 300, 1));
    }

    #[test]
    fn test_bottom_right_follows_cursor() {
        let mut interaction = Interaction::new();
        let grab = Geometry::new(10, 10, 300, 200);
        let edges = ResizeEdges::BOTTOM | ResizeEdges::RIGHT;
        // Grabbed 2 units outside the corner
        interaction.begin_resize(WindowId(1), Point::new(312, 212), grab, edges);
        assert_eq!(interaction.grab_offset, Point::new(2, 2));

        let border = interaction.border_at(Point::new(412, 262));
        assert_eq!(edge_resize(grab, edges, border), Geometry::new(10, 10, 400, 250));
    }

    #[test]
    fn test_left_edge_moves_origin() {
        let grab = Geometry::new(100, 50, 300, 200);
        let result = edge_resize(grab, ResizeEdges::LEFT, Point::new(40, 0));
        assert_eq!(result, Geometry::new(40, 50, 360, 200));
    }

    #[test]
    fn test_edges_never_invert() {
        let grab = Geometry::new(0, 0, 300, 200);
        let all = [
            ResizeEdges::TOP,
            ResizeEdges::BOTTOM,
            ResizeEdges::LEFT,
            ResizeEdges::RIGHT,
            ResizeEdges::TOP | ResizeEdges::LEFT,
            ResizeEdges::BOTTOM | ResizeEdges::RIGHT,
        ];
        for edges in all {
            for (x, y) in [(-900, -900), (900, 900), (300, 200), (0, 0)] {
                let result = edge_resize(grab, edges, Point::new(x, y));
                assert!(result.width >= 1 && result.height >= 1, "{:?} {:?}", edges, result);
            }
        }
    }

    #[test]
    fn test_release_only_for_grabbed_window() {
        let mut interaction = Interaction::new();
        interaction.begin_move(WindowId(3), Point::new(50, 50), Point::new(10, 10));
        assert_eq!(interaction.grab_offset, Point::new(40, 40));

        assert!(!interaction.release(WindowId(4)));
        assert!(interaction.is_active());

        assert!(interaction.release(WindowId(3)));
        assert_eq!(interaction.cursor_mode, CursorMode::Passthrough);
        assert_eq!(interaction.grabbed, None);
    }
}
