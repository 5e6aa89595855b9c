//! Icon lookup through desktop entries

use freedesktop_desktop_entry::DesktopEntry;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ICON_THEME: &str = "hicolor";
const ICON_SIZE: u16 = 256;
const ICON_THEME_DIR: &str = "/usr/share/icons/hicolor/256x256/apps";
const FALLBACK_ICON: &str = "/usr/share/icons/hicolor/256x256/apps/qemu.png";

/// Maps an app id to the image shown on its taskbar tile
#[derive(Debug, Clone)]
pub struct IconResolver {
    /// Directories holding `<app_id>.desktop` files, highest priority first
    application_dirs: Vec<PathBuf>,
}

impl IconResolver {
    /// Search the XDG data directories
    pub fn from_xdg() -> Self {
        let mut dirs = Vec::new();
        match xdg::BaseDirectories::new() {
            Ok(base) => {
                dirs.push(base.get_data_home().join("applications"));
                dirs.extend(
                    base.get_data_dirs()
                        .into_iter()
                        .map(|dir| dir.join("applications")),
                );
            }
            Err(e) => {
                warn!("XDG base directories unavailable: {}", e);
                dirs.push(PathBuf::from("/usr/share/applications"));
            }
        }
        Self::with_dirs(dirs)
    }

    pub fn with_dirs(application_dirs: Vec<PathBuf>) -> Self {
        Self { application_dirs }
    }

    /// Icon image for `app_id`, or the fallback icon
    pub fn resolve(&self, app_id: &str) -> PathBuf {
        let entry = self
            .application_dirs
            .iter()
            .map(|dir| dir.join(format!("{}.desktop", app_id)))
            .find(|path| path.is_file());

        match entry.as_deref().and_then(icon_name) {
            Some(name) => icon_path(&name),
            None => {
                debug!("No desktop entry icon for {:?}", app_id);
                PathBuf::from(FALLBACK_ICON)
            }
        }
    }
}

/// `Icon` key of the `[Desktop Entry]` group
fn icon_name(path: &Path) -> Option<String> {
    match DesktopEntry::from_path(path, None::<&[&str]>) {
        Ok(entry) => entry
            .icon()
            .map(str::trim)
            .filter(|icon| !icon.is_empty())
            .map(str::to_string),
        Err(e) => {
            warn!("Failed to parse {:?}: {}", path, e);
            None
        }
    }
}

/// Image file for an `Icon` value: absolute paths are used as is, names go
/// through the icon theme
fn icon_path(icon: &str) -> PathBuf {
    if Path::new(icon).is_absolute() {
        return PathBuf::from(icon);
    }

    match linicon::lookup_icon(icon)
        .from_theme(ICON_THEME)
        .with_size(ICON_SIZE)
        .next()
    {
        Some(Ok(found)) => found.path,
        Some(Err(e)) => {
            debug!("Theme lookup for {:?} failed: {:?}", icon, e);
            theme_dir_path(icon)
        }
        None => theme_dir_path(icon),
    }
}

fn theme_dir_path(icon: &str) -> PathBuf {
    Path::new(ICON_THEME_DIR).join(format!("{}.png", icon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver_with(file: &str, content: &str) -> (tempfile::TempDir, IconResolver) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(file), content).unwrap();
        let resolver = IconResolver::with_dirs(vec![dir.path().to_path_buf()]);
        (dir, resolver)
    }

    #[test]
    fn test_resolves_icon_from_desktop_entry() {
        let (_dir, resolver) = resolver_with(
            "kestrel-demo.desktop",
            "[Desktop Entry]\nType=Application\nName=Demo\nIcon=kestrel-demo-nonexistent\nExec=demo\n",
        );
        assert_eq!(
            resolver.resolve("kestrel-demo"),
            PathBuf::from("/usr/share/icons/hicolor/256x256/apps/kestrel-demo-nonexistent.png")
        );
    }

    #[test]
    fn test_icon_comes_from_main_group() {
        let (_dir, resolver) = resolver_with(
            "viewer.desktop",
            "[Desktop Action new-window]\nName=New Window\nIcon=/opt/viewer/action.png\n\n\
             [Desktop Entry]\nType=Application\nName=Viewer\nIcon=/opt/viewer/viewer.png\nExec=viewer\n",
        );
        assert_eq!(resolver.resolve("viewer"), PathBuf::from("/opt/viewer/viewer.png"));
    }

    #[test]
    fn test_entry_without_icon_uses_fallback() {
        let (_dir, resolver) = resolver_with(
            "plain.desktop",
            "[Desktop Entry]\nType=Application\nName=Plain\nExec=plain\n",
        );
        assert_eq!(resolver.resolve("plain"), PathBuf::from(FALLBACK_ICON));
    }

    #[test]
    fn test_missing_entry_uses_fallback() {
        let resolver = IconResolver::with_dirs(Vec::new());
        assert_eq!(resolver.resolve("NO_APP_ID"), PathBuf::from(FALLBACK_ICON));
    }
}
