//! Keyboard Module
//!
//! Compositor shortcuts (all behind the Super modifier), the Super+Control
//! window modifier that turns pointer buttons into move/resize, and Alt+Tab
//! cycling through the focus order.

use std::collections::HashMap;
use tracing::debug;

use crate::backend::Modifiers;
use crate::config::KeybindingsConfig;

pub const KEY_CONTROL_L: &str = "Control_L";
pub const KEY_ALT_L: &str = "Alt_L";
pub const KEY_TAB: &str = "Tab";

/// Keyboard shortcut action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// End the session
    Quit,
    /// Minimize the focused window
    Minimize,
    /// Toggle maximize on the focused window
    ToggleMaximize,
    /// Toggle fullscreen on the focused window
    ToggleFullscreen,
    /// Ask the focused window to close
    CloseWindow,
    /// Run a shell command
    Spawn(String),
}

/// Keysym -> action table, consulted while Super is held
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    bindings: HashMap<String, KeyAction>,
}

impl KeyBindings {
    pub fn from_config(config: &KeybindingsConfig) -> Self {
        let mut bindings = HashMap::new();

        // Extra commands first so the built-in actions win on conflicts
        for (keysym, command) in &config.commands {
            bindings.insert(keysym.clone(), KeyAction::Spawn(command.clone()));
        }
        bindings.insert(config.launcher.clone(), KeyAction::Spawn(config.launcher_command.clone()));
        bindings.insert(config.quit.clone(), KeyAction::Quit);
        bindings.insert(config.minimize.clone(), KeyAction::Minimize);
        bindings.insert(config.maximize.clone(), KeyAction::ToggleMaximize);
        bindings.insert(config.fullscreen.clone(), KeyAction::ToggleFullscreen);
        bindings.insert(config.close_window.clone(), KeyAction::CloseWindow);

        debug!("Registered {} key bindings", bindings.len());
        Self { bindings }
    }

    pub fn lookup(&self, keysym: &str) -> Option<&KeyAction> {
        self.bindings.get(keysym)
    }
}

/// Modifier tracking, window modifier and Alt+Tab state
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    pub modifiers: Modifiers,

    /// Super+Control_L held: pointer buttons move/resize windows
    pub window_modifier: bool,

    /// Alt+Tab position in the focus order; None when not switching
    pub switch_index: Option<usize>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn super_held(&self) -> bool {
        self.modifiers.contains(Modifiers::LOGO)
    }

    pub fn alt_held(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Record a modifier update. Returns true if the window modifier was
    /// disarmed by it.
    pub fn update_modifiers(&mut self, modifiers: Modifiers) -> bool {
        self.modifiers = modifiers;
        if !self.super_held() && self.window_modifier {
            self.window_modifier = false;
            return true;
        }
        false
    }

    /// Step the Alt+Tab position over `len` windows
    pub fn advance_switch(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let next = self.switch_index.map_or(1, |index| index + 1) % len;
        self.switch_index = Some(next);
        Some(next)
    }

    /// Leave Alt+Tab, returning the chosen position
    pub fn finish_switch(&mut self) -> Option<usize> {
        self.switch_index.take()
    }
}
