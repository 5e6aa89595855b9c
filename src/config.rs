//! Configuration system for Kestrel
//!
//! Loads configuration from TOML file at `~/.config/kestrel/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell commands run once at startup
    pub startup_commands: Vec<String>,
    pub appearance: AppearanceConfig,
    pub keybindings: KeybindingsConfig,
    pub monitors: Vec<MonitorConfig>,
    pub taskbar: TaskbarConfig,
    pub interaction: InteractionConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, writing the defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            // Auto-generate default config file
            if let Err(e) = Self::save_default(config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).context("Failed to read config file")?;
        let config = Self::parse(&content)?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("kestrel");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Border appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Border width in pixels
    pub border_width: i32,
    /// Border color of unfocused windows: RGBA 0.0-1.0
    pub border_color_normal: [f32; 4],
    /// Border color of the focused window: RGBA 0.0-1.0
    pub border_color_focused: [f32; 4],
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            border_width: 3,
            border_color_normal: [0.3, 0.3, 0.3, 1.0],
            border_color_focused: [0.37, 0.51, 0.67, 1.0],
        }
    }
}

/// Keyboard shortcuts. Every binding is active while Super is held.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    /// Keysym that ends the session
    pub quit: String,
    pub minimize: String,
    pub maximize: String,
    pub fullscreen: String,
    pub close_window: String,
    /// Launcher key (keysym name)
    pub launcher: String,
    /// Command to run when the launcher key is pressed
    pub launcher_command: String,
    /// Extra keysym -> shell command bindings
    pub commands: BTreeMap<String, String>,
}

impl Default for KeybindingsConfig {
    fn default() -> Self {
        Self {
            quit: "Escape".to_string(),
            minimize: "h".to_string(),
            maximize: "j".to_string(),
            fullscreen: "k".to_string(),
            close_window: "n".to_string(),
            launcher: "r".to_string(),
            launcher_command: "wofi --show drun".to_string(),
            commands: BTreeMap::new(),
        }
    }
}

/// Placement of a named output in the layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub name: String,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Taskbar process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskbarConfig {
    /// Launch the taskbar when the first output appears
    pub launch: bool,
    /// Taskbar executable
    pub program: String,
    /// Height of the band reserved at the bottom of the output
    pub height: i32,
    /// Toplevel title that identifies the taskbar's own surface
    pub title: String,
    /// Size of the shared notification region in bytes
    pub channel_capacity: usize,
}

impl Default for TaskbarConfig {
    fn default() -> Self {
        Self {
            launch: true,
            program: "kestrel-bar".to_string(),
            height: 50,
            title: kestrel_ipc::TASKBAR_CLIENT.to_string(),
            channel_capacity: kestrel_ipc::DEFAULT_CAPACITY,
        }
    }
}

/// Interactive move/resize tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Smallest width and height reachable by a free resize
    pub min_free_resize: i32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_free_resize: crate::wm::moveresize::MIN_FREE_RESIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
startup_commands = ["foot"]

[taskbar]
height = 64

[keybindings.commands]
t = "foot"

[[monitors]]
name = "HDMI-A-1"
offset_x = 1920
offset_y = 0
"#,
        )
        .unwrap();

        assert_eq!(config.startup_commands, vec!["foot".to_string()]);
        assert_eq!(config.taskbar.height, 64);
        assert_eq!(config.taskbar.program, "kestrel-bar");
        assert_eq!(config.keybindings.quit, "Escape");
        assert_eq!(config.keybindings.commands.get("t").map(String::as_str), Some("foot"));
        assert_eq!(config.monitors[0].offset_x, 1920);
        assert_eq!(config.interaction.min_free_resize, 100);
    }

    #[test]
    fn test_default_file_is_generated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kestrel").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.appearance.border_width, 3);
        assert!(path.exists());

        // The generated file parses back to the same values
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.keybindings.maximize, "j");
        assert_eq!(reloaded.taskbar.channel_capacity, 4096);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(Config::parse("taskbar = 3").is_err());
    }
}
