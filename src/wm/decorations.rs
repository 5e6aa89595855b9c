//! Window borders for Kestrel
//!
//! Four solid rectangles drawn by the backend around a window's geometry
//! box. Rectangles are relative to the box origin.

use crate::config::AppearanceConfig;
use crate::shared::Geometry;

/// RGBA, each channel 0.0-1.0
pub type Color = [f32; 4];

/// Border width and palette
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderStyle {
    pub width: i32,
    pub normal: Color,
    pub focused: Color,
}

impl BorderStyle {
    pub fn color(&self, focused: bool) -> Color {
        if focused {
            self.focused
        } else {
            self.normal
        }
    }
}

impl From<&AppearanceConfig> for BorderStyle {
    fn from(appearance: &AppearanceConfig) -> Self {
        Self {
            width: appearance.border_width,
            normal: appearance.border_color_normal,
            focused: appearance.border_color_focused,
        }
    }
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self::from(&AppearanceConfig::default())
    }
}

/// Decoration rectangles of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub top: Geometry,
    pub bottom: Geometry,
    pub left: Geometry,
    pub right: Geometry,
    /// Thickness of every rectangle
    pub width: i32,
    pub color: Color,
}

impl Border {
    /// Border around a `width` x `height` box
    pub fn around(width: i32, height: i32, border_width: i32, color: Color) -> Self {
        let mut border = Self {
            top: Geometry::default(),
            bottom: Geometry::default(),
            left: Geometry::default(),
            right: Geometry::default(),
            width: border_width,
            color,
        };
        border.fit(width, height);
        border
    }

    /// Re-lay the rectangles for a new box size
    pub fn fit(&mut self, width: i32, height: i32) {
        let bw = self.width;
        self.top = Geometry::new(0, 0, width, bw);
        self.bottom = Geometry::new(0, height, width, bw);
        self.left = Geometry::new(0, 0, bw, height);
        // Right edge also covers the bottom-right corner
        self.right = Geometry::new(width, 0, bw, height + bw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_layout() {
        let border = Border::around(200, 100, 3, [1.0; 4]);
        assert_eq!(border.top, Geometry::new(0, 0, 200, 3));
        assert_eq!(border.bottom, Geometry::new(0, 100, 200, 3));
        assert_eq!(border.left, Geometry::new(0, 0, 3, 100));
        assert_eq!(border.right, Geometry::new(200, 0, 3, 103));
    }

    #[test]
    fn test_fit_keeps_width_and_color() {
        let mut border = Border::around(200, 100, 3, [0.5; 4]);
        border.fit(50, 40);
        assert_eq!(border.bottom, Geometry::new(0, 40, 50, 3));
        assert_eq!(border.right, Geometry::new(50, 0, 3, 43));
        assert_eq!(border.color, [0.5; 4]);
    }

    #[test]
    fn test_style_picks_palette() {
        let style = BorderStyle {
            width: 2,
            normal: [0.0, 0.0, 0.0, 1.0],
            focused: [1.0, 0.0, 0.0, 1.0],
        };
        assert_eq!(style.color(true), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(style.color(false), [0.0, 0.0, 0.0, 1.0]);
    }
}
