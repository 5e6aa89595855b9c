//! Screen Module
//!
//! Output layout: where each output sits, and which one is active.

use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::shared::Geometry;

/// Output device in the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub name: String,
    pub x: i32,
    pub y: i32,
    /// Effective resolution
    pub width: i32,
    pub height: i32,
}

impl Output {
    pub fn area(&self) -> Geometry {
        Geometry::new(self.x, self.y, self.width, self.height)
    }

    /// Area left for windows once the taskbar band is reserved at the bottom
    pub fn usable_area(&self, taskbar_height: i32) -> Geometry {
        Geometry::new(self.x, self.y, self.width, (self.height - taskbar_height).max(1))
    }
}

/// Outputs in plug order; the first one is the active output
#[derive(Debug, Clone, Default)]
pub struct OutputLayout {
    outputs: Vec<Output>,
    monitors: Vec<MonitorConfig>,
}

impl OutputLayout {
    pub fn new(monitors: Vec<MonitorConfig>) -> Self {
        Self {
            outputs: Vec::new(),
            monitors,
        }
    }

    /// Add an output at its configured offset, or right of the others
    pub fn add(&mut self, name: &str, width: i32, height: i32) -> &Output {
        self.outputs.retain(|o| o.name != name);

        let (x, y) = match self.monitors.iter().find(|m| m.name == name) {
            Some(monitor) => (monitor.offset_x, monitor.offset_y),
            None => {
                let x = self.outputs.iter().map(|o| o.x + o.width).max().unwrap_or(0);
                (x, 0)
            }
        };

        info!("Output {} added: {}x{} at ({}, {})", name, width, height, x, y);
        self.outputs.push(Output {
            name: name.to_string(),
            x,
            y,
            width,
            height,
        });
        &self.outputs[self.outputs.len() - 1]
    }

    /// Record a new effective resolution
    pub fn update(&mut self, name: &str, width: i32, height: i32) -> Option<&Output> {
        let output = self.outputs.iter_mut().find(|o| o.name == name)?;
        output.width = width;
        output.height = height;
        debug!("Output {} is now {}x{}", name, width, height);
        Some(output)
    }

    pub fn active(&self) -> Option<&Output> {
        self.outputs.first()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active().is_some_and(|o| o.name == name)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_placed_left_to_right() {
        let mut layout = OutputLayout::new(Vec::new());
        layout.add("eDP-1", 1920, 1080);
        let second = layout.add("HDMI-A-1", 2560, 1440).clone();

        assert_eq!(second.x, 1920);
        assert_eq!(layout.active().map(|o| o.name.as_str()), Some("eDP-1"));
        assert!(layout.is_active("eDP-1"));
    }

    #[test]
    fn test_configured_offset_wins() {
        let mut layout = OutputLayout::new(vec![MonitorConfig {
            name: "DP-2".into(),
            offset_x: -1280,
            offset_y: 200,
        }]);
        let output = layout.add("DP-2", 1280, 1024);
        assert_eq!((output.x, output.y), (-1280, 200));
    }

    #[test]
    fn test_usable_area_reserves_taskbar() {
        let mut layout = OutputLayout::new(Vec::new());
        layout.add("eDP-1", 1920, 1080);
        let output = layout.active().unwrap();
        assert_eq!(output.usable_area(50), Geometry::new(0, 0, 1920, 1030));
        assert_eq!(output.area(), Geometry::new(0, 0, 1920, 1080));

        layout.update("eDP-1", 1280, 720);
        assert_eq!(layout.active().unwrap().usable_area(50).height, 670);
        assert!(layout.update("nope", 1, 1).is_none());
    }
}
