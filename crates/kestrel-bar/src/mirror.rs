//! Taskbar icon mirror
//!
//! Keeps one icon per window the compositor has announced, lays the icons out
//! left to right and turns presses into focus/minimize requests.

use crate::icons::IconResolver;
use kestrel_ipc::{Action, Record, COMPOSITOR_CLIENT};
use std::path::PathBuf;
use tracing::debug;

/// Height of the bar strip; matches the band the compositor reserves
pub const BAR_HEIGHT: f32 = 50.0;

const START_X: f32 = 5.0;
const START_Y: f32 = 5.0;
const BACKGROUND_SIZE: f32 = 40.0;
const IMAGE_SIZE: f32 = 30.0;
const PADDING: f32 = 5.0;
const INTERNAL_PADDING: f32 = 10.0;

/// What the taskbar believes about a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    Normal,
    Minimized,
}

/// One taskbar entry
#[derive(Debug, Clone)]
pub struct Icon {
    pub window_id: u64,
    pub app_id: String,
    pub title: String,
    pub icon_path: PathBuf,
    pub state: IconState,
    pub focused: bool,
}

/// Axis-aligned rectangle in bar-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl IconRect {
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Background tile of the icon at `index`
pub fn background_rect(index: usize) -> IconRect {
    IconRect {
        x: START_X + (BACKGROUND_SIZE + PADDING) * index as f32,
        y: START_Y,
        width: BACKGROUND_SIZE,
        height: BACKGROUND_SIZE,
    }
}

/// Image area inside the tile at `index`
pub fn image_rect(index: usize) -> IconRect {
    let tile = background_rect(index);
    IconRect {
        x: tile.x + INTERNAL_PADDING / 2.0,
        y: tile.y + INTERNAL_PADDING / 2.0,
        width: IMAGE_SIZE,
        height: IMAGE_SIZE,
    }
}

/// Mirror of the compositor's managed windows
#[derive(Debug)]
pub struct IconMirror {
    icons: Vec<Icon>,
    width: f32,
    height: f32,
}

impl IconMirror {
    pub fn new(width: f32) -> Self {
        Self {
            icons: Vec::new(),
            width,
            height: BAR_HEIGHT,
        }
    }

    pub fn icons(&self) -> &[Icon] {
        &self.icons
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn get(&self, window_id: u64) -> Option<&Icon> {
        self.icons.iter().find(|icon| icon.window_id == window_id)
    }

    /// Apply a record polled from the channel.
    ///
    /// Only compositor records are considered. Returns true if the mirror
    /// changed.
    pub fn apply(&mut self, record: &Record, resolver: &IconResolver) -> bool {
        if !record.is_from(COMPOSITOR_CLIENT) {
            debug!("Ignoring record from {:?}", record.sender_client);
            return false;
        }

        match &record.action {
            Action::AddWindow {
                window_id,
                app_id,
                title,
            } => {
                if self.get(*window_id).is_some() {
                    debug!("Icon for window {} already exists", window_id);
                    return false;
                }
                self.icons.push(Icon {
                    window_id: *window_id,
                    app_id: app_id.clone(),
                    title: title.clone(),
                    icon_path: resolver.resolve(app_id),
                    state: IconState::Normal,
                    focused: false,
                });
                debug!("Added icon for window {} ({})", window_id, app_id);
                true
            }

            Action::RemoveWindow { window_id } => {
                let before = self.icons.len();
                self.icons.retain(|icon| icon.window_id != *window_id);
                if self.icons.len() == before {
                    debug!("No icon for removed window {}", window_id);
                    return false;
                }
                true
            }

            Action::ConfigureEshybar { width, .. } => {
                self.width = *width as f32;
                self.height = BAR_HEIGHT;
                debug!("Bar resized to {}x{}", self.width, self.height);
                true
            }

            // Taskbar-originated actions have no meaning here
            _ => false,
        }
    }

    /// Index of the icon under a bar-local point
    pub fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        (0..self.icons.len()).find(|&index| background_rect(index).contains(x, y))
    }

    /// Handle a pointer press; returns the action to send to the compositor.
    pub fn press(&mut self, x: f32, y: f32) -> Option<Action> {
        let index = self.hit_test(x, y)?;
        let icon = &self.icons[index];
        let window_id = icon.window_id;

        if !icon.focused {
            for other in self.icons.iter_mut() {
                other.focused = false;
            }
            let icon = &mut self.icons[index];
            icon.focused = true;
            icon.state = IconState::Normal;
            Some(Action::FocusWindow { window_id })
        } else if icon.state == IconState::Normal {
            let icon = &mut self.icons[index];
            icon.focused = false;
            icon.state = IconState::Minimized;
            Some(Action::MinimizeWindow { window_id })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IconResolver {
        IconResolver::with_dirs(Vec::new())
    }

    fn add(id: u64) -> Record {
        Record::from_compositor(Action::AddWindow {
            window_id: id,
            app_id: "foot".into(),
            title: "Terminal".into(),
        })
    }

    #[test]
    fn test_add_and_remove_icons() {
        let mut mirror = IconMirror::new(1920.0);
        assert!(mirror.apply(&add(1), &resolver()));
        assert!(mirror.apply(&add(2), &resolver()));
        assert!(!mirror.apply(&add(2), &resolver()));
        assert_eq!(mirror.icons().len(), 2);

        let remove = Record::from_compositor(Action::RemoveWindow { window_id: 1 });
        assert!(mirror.apply(&remove, &resolver()));
        assert_eq!(mirror.icons().len(), 1);
        assert_eq!(mirror.icons()[0].window_id, 2);
    }

    #[test]
    fn test_remove_unknown_icon_is_noop() {
        let mut mirror = IconMirror::new(1920.0);
        let remove = Record::from_compositor(Action::RemoveWindow { window_id: 77 });
        assert!(!mirror.apply(&remove, &resolver()));
        assert!(mirror.icons().is_empty());
    }

    #[test]
    fn test_ignores_taskbar_records() {
        let mut mirror = IconMirror::new(1920.0);
        let record = Record::from_taskbar(Action::AddWindow {
            window_id: 1,
            app_id: "foot".into(),
            title: String::new(),
        });
        assert!(!mirror.apply(&record, &resolver()));
        assert!(mirror.icons().is_empty());
    }

    #[test]
    fn test_configure_resizes_bar() {
        let mut mirror = IconMirror::new(800.0);
        let record = Record::from_compositor(Action::ConfigureEshybar {
            width: 2560,
            height: 1440,
        });
        mirror.apply(&record, &resolver());
        assert_eq!(mirror.size(), (2560.0, BAR_HEIGHT));
    }

    #[test]
    fn test_layout_closes_gaps_after_removal() {
        let mut mirror = IconMirror::new(1920.0);
        mirror.apply(&add(1), &resolver());
        mirror.apply(&add(2), &resolver());
        mirror.apply(&Record::from_compositor(Action::RemoveWindow { window_id: 1 }), &resolver());

        // Window 2 now sits in the first slot
        assert_eq!(mirror.hit_test(10.0, 10.0), Some(0));
        assert_eq!(mirror.hit_test(55.0, 10.0), None);
        assert_eq!(background_rect(1).x, 50.0);
        assert_eq!(image_rect(0), IconRect { x: 10.0, y: 10.0, width: 30.0, height: 30.0 });
    }

    #[test]
    fn test_press_cycles_focus_and_minimize() {
        let mut mirror = IconMirror::new(1920.0);
        mirror.apply(&add(1), &resolver());
        mirror.apply(&add(2), &resolver());

        assert_eq!(mirror.press(10.0, 10.0), Some(Action::FocusWindow { window_id: 1 }));
        assert!(mirror.get(1).unwrap().focused);

        assert_eq!(mirror.press(60.0, 10.0), Some(Action::FocusWindow { window_id: 2 }));
        assert!(!mirror.get(1).unwrap().focused);

        assert_eq!(mirror.press(60.0, 10.0), Some(Action::MinimizeWindow { window_id: 2 }));
        assert_eq!(mirror.get(2).unwrap().state, IconState::Minimized);

        // A minimized icon focuses (and restores) on the next press
        assert_eq!(mirror.press(60.0, 10.0), Some(Action::FocusWindow { window_id: 2 }));
        assert_eq!(mirror.get(2).unwrap().state, IconState::Normal);
    }

    #[test]
    fn test_press_outside_icons() {
        let mut mirror = IconMirror::new(1920.0);
        mirror.apply(&add(1), &resolver());
        assert_eq!(mirror.press(500.0, 10.0), None);
        assert_eq!(mirror.press(10.0, 48.0), None);
    }
}
