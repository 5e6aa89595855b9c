//! Window Manager Module
//!
//! Event dispatch for the compositor: turns backend events and taskbar
//! requests into registry, interaction and window-state changes. Everything
//! runs on one thread, one handler at a time.

pub mod decorations;
pub mod focus;
pub mod keyboard;
pub mod moveresize;
pub mod screen;
pub mod taskbar;
pub mod window;

use tracing::{debug, info, warn};

use kestrel_ipc::SharedChannel;

use crate::backend::{
    Backend, BackendEvent, HeadlessBackend, Modifiers, ResizeEdges, SurfaceBindings, SurfaceKey, BTN_LEFT,
    BTN_RIGHT,
};
use crate::config::Config;
use crate::shared::{Geometry, Point, WindowId, WindowKind, WindowState};
use decorations::BorderStyle;
use focus::WindowRegistry;
use keyboard::{KeyAction, KeyBindings, KeyboardState, KEY_ALT_L, KEY_CONTROL_L, KEY_TAB};
use moveresize::{CursorMode, Interaction};
use screen::OutputLayout;
use taskbar::{TaskbarLink, TaskbarRequest};

/// Compositor state, passed to every handler
pub struct Compositor<B: Backend> {
    backend: B,
    config: Config,
    style: BorderStyle,
    key_bindings: KeyBindings,

    /// Surface -> window routes, owned per window
    surfaces: SurfaceBindings,

    pub registry: WindowRegistry,
    pub interaction: Interaction,
    pub keyboard: KeyboardState,
    pub outputs: OutputLayout,
    pub taskbar: TaskbarLink,

    /// Cursor position in layout coordinates
    cursor: Point,

    running: bool,
}

impl<B: Backend> Compositor<B> {
    pub fn new(backend: B, config: Config, channel: SharedChannel) -> Self {
        Self {
            backend,
            style: BorderStyle::from(&config.appearance),
            key_bindings: KeyBindings::from_config(&config.keybindings),
            outputs: OutputLayout::new(config.monitors.clone()),
            config,
            surfaces: SurfaceBindings::new(),
            registry: WindowRegistry::new(),
            interaction: Interaction::new(),
            keyboard: KeyboardState::new(),
            taskbar: TaskbarLink::new(channel),
            cursor: Point::default(),
            running: true,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run the configured startup commands, then `extra`
    pub fn run_startup(&mut self, extra: Option<&str>) {
        let commands: Vec<String> = self
            .config
            .startup_commands
            .iter()
            .cloned()
            .chain(extra.map(str::to_string))
            .collect();
        for command in commands {
            info!("Running startup command: {}", command);
            self.spawn_shell(&command);
        }
    }

    fn spawn_shell(&mut self, command: &str) {
        let args = vec!["-c".to_string(), command.to_string()];
        if let Err(e) = self.backend.spawn("sh", &args) {
            warn!("Failed to run {:?}: {}", command, e);
        }
    }

    fn window_for(&self, surface: SurfaceKey) -> Option<WindowId> {
        let id = self.surfaces.lookup(surface);
        if id.is_none() {
            debug!("No window for surface {:?}", surface);
        }
        id
    }

    // ========================================================================
    // Event dispatch
    // ========================================================================

    pub fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::NewOutput { name, width, height } => self.new_output(&name, width, height),
            BackendEvent::OutputChanged { name, width, height } => {
                self.output_changed(&name, width, height)
            }
            BackendEvent::NewToplevel {
                surface,
                kind,
                title,
                app_id,
                geometry,
            } => self.new_toplevel(surface, kind, title, app_id, geometry),
            BackendEvent::Map { surface } => self.map(surface),
            BackendEvent::Unmap { surface } => self.unmap(surface),
            BackendEvent::Destroy { surface } => self.destroy(surface),
            BackendEvent::RequestMove { surface } => {
                self.request_interactive(surface, CursorMode::Moving, ResizeEdges::empty())
            }
            BackendEvent::RequestResize { surface, edges } => self.request_interactive(
                surface,
                CursorMode::Resizing,
                ResizeEdges::from_bits_truncate(edges),
            ),
            BackendEvent::RequestMaximize { surface } => {
                if let Some(id) = self.window_for(surface) {
                    self.toggle_maximize(id);
                }
            }
            BackendEvent::RequestFullscreen { surface } => {
                if let Some(id) = self.window_for(surface) {
                    self.toggle_fullscreen(id);
                }
            }
            BackendEvent::RequestMinimize { surface } => {
                if let Some(id) = self.window_for(surface) {
                    self.minimize(id);
                }
            }
            BackendEvent::SetTitle { surface, title } => self.set_title(surface, title),
            BackendEvent::SetAppId { surface, app_id } => {
                if let Some(window) = self.window_for(surface).and_then(|id| self.registry.get_mut(id)) {
                    window.app_id = Some(app_id);
                }
            }
            BackendEvent::RequestActivate { surface } => {
                if let Some(id) = self.window_for(surface) {
                    self.registry.focus(id, &mut self.backend, &self.style);
                }
            }
            BackendEvent::RequestConfigure { surface, geometry } => {
                if let Some(window) = self.window_for(surface).and_then(|id| self.registry.get_mut(id)) {
                    window.place(&mut self.backend, geometry);
                }
            }
            BackendEvent::PointerMotion { x, y } => self.pointer_motion(Point::new(x, y)),
            BackendEvent::PointerButton { button, pressed } => self.pointer_button(button, pressed),
            BackendEvent::Key {
                keycode,
                keysym,
                pressed,
            } => self.key(keycode, &keysym, pressed),
            BackendEvent::Modifiers { modifiers } => {
                if self.keyboard.update_modifiers(Modifiers::from_bits_truncate(modifiers)) {
                    self.interaction.end();
                }
            }
        }
        debug_assert!(self.registry.is_consistent(), "focus invariants broken");
    }

    // ========================================================================
    // Outputs and taskbar
    // ========================================================================

    fn new_output(&mut self, name: &str, width: i32, height: i32) {
        self.outputs.add(name, width, height);

        if self.outputs.len() == 1 && self.config.taskbar.launch && !self.taskbar.launched {
            self.launch_taskbar(width, height);
        }
        if self.outputs.is_active(name) {
            self.place_taskbar();
        }
    }

    fn output_changed(&mut self, name: &str, width: i32, height: i32) {
        if self.outputs.update(name, width, height).is_none() {
            debug!("Change for unknown output {}", name);
            return;
        }
        if self.outputs.is_active(name) {
            self.place_taskbar();
            self.taskbar.output_configured(width, height);
        }
    }

    fn launch_taskbar(&mut self, width: i32, height: i32) {
        let Some(path) = self.taskbar.channel().path() else {
            warn!("Notification channel has no file, not launching the taskbar");
            return;
        };
        let args = vec![
            path.display().to_string(),
            width.to_string(),
            height.to_string(),
        ];
        let program = self.config.taskbar.program.clone();
        match self.backend.spawn(&program, &args) {
            Ok(()) => self.taskbar.launched = true,
            Err(e) => warn!("Failed to launch taskbar: {}", e),
        }
    }

    /// Pin the taskbar surface to the bottom band of the active output
    fn place_taskbar(&mut self) {
        let (Some(surface), Some(output)) = (self.taskbar.surface, self.outputs.active()) else {
            return;
        };
        let y = output.y + output.height - self.config.taskbar.height;
        self.backend.set_node_position(surface, output.x, y);
    }

    /// The taskbar's own toplevel showed up
    fn adopt_taskbar(&mut self, surface: SurfaceKey) {
        info!("Taskbar surface {:?} attached", surface);
        self.taskbar.surface = Some(surface);
        self.place_taskbar();

        // The taskbar may have missed earlier records; replay the window set
        // one record per frame tick
        let mut windows: Vec<&window::Window> =
            self.registry.windows().filter(|w| w.is_managed()).collect();
        windows.sort_by_key(|w| w.id);
        let actions: Vec<_> = windows.into_iter().map(taskbar::add_window_action).collect();
        self.taskbar.replay(actions);
    }

    /// One taskbar request in and at most one queued record out per frame
    /// tick
    pub fn poll_taskbar(&mut self) {
        if let Some(request) = self.taskbar.poll() {
            self.handle_taskbar_request(request);
        }
        self.taskbar.flush();
    }

    pub fn handle_taskbar_request(&mut self, request: TaskbarRequest) {
        debug!("Taskbar request {:?}", request);
        match request {
            TaskbarRequest::Focus(id) => {
                if self.registry.get(id).is_none() {
                    debug!("Taskbar asked to focus unknown window {}", id);
                    return;
                }
                self.registry.focus(id, &mut self.backend, &self.style);
            }
            TaskbarRequest::Unfocus(id) => {
                self.registry.unfocus(id, &mut self.backend, &self.style);
            }
            TaskbarRequest::Minimize(id) => match self.registry.get(id).map(|w| w.is_minimized()) {
                Some(true) => {
                    self.registry.focus(id, &mut self.backend, &self.style);
                }
                Some(false) => {
                    self.minimize(id);
                }
                None => debug!("Taskbar asked to minimize unknown window {}", id),
            },
        }
    }

    // ========================================================================
    // Window lifecycle
    // ========================================================================

    fn new_toplevel(
        &mut self,
        surface: SurfaceKey,
        kind: WindowKind,
        title: Option<String>,
        app_id: Option<String>,
        geometry: Geometry,
    ) {
        if title.as_deref() == Some(self.config.taskbar.title.as_str()) {
            self.adopt_taskbar(surface);
            return;
        }

        let surfaces = &self.surfaces;
        let id = self
            .registry
            .create(kind, |id| surfaces.bind(surface, id), title, app_id, geometry);

        if kind.is_managed() {
            if let Some(window) = self.registry.get(id) {
                self.taskbar.window_added(window);
            }
        }
    }

    fn set_title(&mut self, surface: SurfaceKey, title: String) {
        let Some(id) = self.window_for(surface) else {
            return;
        };

        // Shell clients name their toplevel after creating it
        let unmapped = self.registry.get(id).is_some_and(|w| !w.mapped);
        if unmapped && title == self.config.taskbar.title {
            if let Some(window) = self.registry.remove(id) {
                if window.is_managed() {
                    self.taskbar.window_removed(id);
                }
            }
            self.adopt_taskbar(surface);
            return;
        }

        if let Some(window) = self.registry.get_mut(id) {
            window.title = Some(title);
        }
    }

    fn map(&mut self, surface: SurfaceKey) {
        if self.taskbar.is_taskbar_surface(surface) {
            self.place_taskbar();
            return;
        }
        let Some(id) = self.window_for(surface) else {
            return;
        };
        let Some(window) = self.registry.get_mut(id) else {
            return;
        };

        window.sync_geometry(&self.backend);
        if !window.is_managed() {
            window.move_node(&mut self.backend, self.cursor.x, self.cursor.y);
            window.mapped = true;
            debug!("Unmanaged window {} mapped at {:?}", id, self.cursor);
            return;
        }

        window.create_border(&mut self.backend, &self.style);
        self.registry.insert_mapped(id);
        self.registry.focus(id, &mut self.backend, &self.style);
        info!("Window {} mapped", id);
    }

    fn unmap(&mut self, surface: SurfaceKey) {
        if self.taskbar.is_taskbar_surface(surface) {
            return;
        }
        let Some(id) = self.window_for(surface) else {
            return;
        };

        if let Some(window) = self.registry.get_mut(id) {
            window.destroy_border(&mut self.backend);
        }
        self.registry.withdraw(id, &mut self.backend, &self.style);
        if self.interaction.release(id) {
            debug!("Gesture on window {} ended by unmap", id);
        }
    }

    fn destroy(&mut self, surface: SurfaceKey) {
        if self.taskbar.is_taskbar_surface(surface) {
            info!("Taskbar surface destroyed");
            self.taskbar.surface = None;
            return;
        }
        let Some(id) = self.window_for(surface) else {
            return;
        };

        if self.registry.get(id).is_some_and(|w| w.is_managed()) {
            self.taskbar.window_removed(id);
        }
        self.interaction.release(id);
        // Dropping the window drops its surface route
        drop(self.registry.remove(id));
        info!("Window {} destroyed", id);
    }

    // ========================================================================
    // Window state
    // ========================================================================

    /// Drop the grab on a window about to leave Normal
    fn release_grab(&mut self, id: WindowId) {
        if self.interaction.release(id) {
            debug!("Gesture on window {} ended by a state change", id);
        }
    }

    fn minimize(&mut self, id: WindowId) {
        self.release_grab(id);
        self.registry.minimize(id, &mut self.backend, &self.style);
    }

    fn toggle_maximize(&mut self, id: WindowId) {
        self.release_grab(id);
        let Some(area) = self
            .outputs
            .active()
            .map(|o| o.usable_area(self.config.taskbar.height))
        else {
            debug!("No output to maximize window {} on", id);
            return;
        };
        let Some(window) = self.registry.get_mut(id) else {
            return;
        };
        if window.state() == WindowState::Maximized {
            window.unmaximize(&mut self.backend);
        } else {
            window.maximize(&mut self.backend, area, &self.style);
        }
    }

    fn toggle_fullscreen(&mut self, id: WindowId) {
        self.release_grab(id);
        let Some(area) = self.outputs.active().map(|o| o.area()) else {
            debug!("No output to fullscreen window {} on", id);
            return;
        };
        let Some(window) = self.registry.get_mut(id) else {
            return;
        };
        if window.state() == WindowState::Fullscreen {
            window.unfullscreen(&mut self.backend, &self.style);
        } else {
            window.fullscreen(&mut self.backend, area);
        }
    }

    // ========================================================================
    // Interactive move/resize
    // ========================================================================

    /// Client-initiated gesture; only honoured for the surface under the
    /// pointer
    fn request_interactive(&mut self, surface: SurfaceKey, mode: CursorMode, edges: ResizeEdges) {
        let Some(id) = self.window_for(surface) else {
            return;
        };
        if self.backend.pointer_focus() != Some(surface) {
            debug!("Ignoring {:?} request from window {} without pointer focus", mode, id);
            return;
        }
        self.begin_interactive(id, mode, edges);
    }

    /// Start a gesture on a managed window. Returns false if none started.
    fn begin_interactive(&mut self, id: WindowId, mode: CursorMode, edges: ResizeEdges) -> bool {
        let Some(window) = self.registry.get_mut(id) else {
            return false;
        };
        if !window.is_managed() {
            return false;
        }

        // A dragged window is always Normal
        window.make_normal(&mut self.backend, &self.style);

        match mode {
            CursorMode::Moving => {
                let origin = self.backend.node_position(window.surface);
                self.interaction.begin_move(id, self.cursor, origin);
            }
            CursorMode::Resizing => {
                let geometry = window.layout_box(&self.backend);
                self.interaction.begin_resize(id, self.cursor, geometry, edges);
            }
            CursorMode::Passthrough => return false,
        }
        true
    }

    fn pointer_motion(&mut self, cursor: Point) {
        self.cursor = cursor;

        if !self.interaction.is_active() {
            self.pointer_passthrough();
            return;
        }

        let grabbed = self.interaction.grabbed.and_then(|id| self.registry.get_mut(id));
        let Some(window) = grabbed else {
            self.interaction.end();
            return;
        };

        let border = self.interaction.border_at(cursor);
        let grab = self.interaction.grab_geometry;
        let edges = self.interaction.resize_edges;

        if self.interaction.cursor_mode == CursorMode::Moving {
            window.move_node(&mut self.backend, border.x, border.y);
        } else if edges.is_empty() {
            let min = self.config.interaction.min_free_resize;
            let (width, height) = moveresize::free_resize(grab, border, min);
            window.resize(&mut self.backend, width, height);
        } else {
            let target = moveresize::edge_resize(grab, edges, border);
            window.place(&mut self.backend, target);
        }
    }

    fn pointer_passthrough(&mut self) {
        match self.backend.surface_at(self.cursor) {
            Some((surface, local)) => self.backend.pointer_enter(surface, local),
            None => self.backend.clear_pointer_focus(),
        }
    }

    fn pointer_button(&mut self, button: u32, pressed: bool) {
        if !pressed {
            if let Some(id) = self.interaction.end() {
                debug!("Gesture on window {} released", id);
            }
            self.backend.forward_button(button, false);
            return;
        }

        let hit = self.backend.surface_at(self.cursor).map(|(surface, _)| surface);
        if hit.is_some_and(|s| self.taskbar.is_taskbar_surface(s)) {
            self.backend.forward_button(button, true);
            return;
        }

        match hit.and_then(|s| self.window_for(s)) {
            Some(id) => {
                self.registry.focus(id, &mut self.backend, &self.style);

                if self.keyboard.window_modifier {
                    let mode = match button {
                        BTN_LEFT => Some(CursorMode::Moving),
                        BTN_RIGHT => Some(CursorMode::Resizing),
                        _ => None,
                    };
                    if let Some(mode) = mode {
                        if self.begin_interactive(id, mode, ResizeEdges::empty()) {
                            return;
                        }
                    }
                }
            }
            None => {
                if let Some(focused) = self.registry.focused() {
                    self.registry.unfocus(focused, &mut self.backend, &self.style);
                }
            }
        }

        self.backend.forward_button(button, true);
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    fn key(&mut self, keycode: u32, keysym: &str, pressed: bool) {
        if keysym == KEY_CONTROL_L && self.keyboard.super_held() {
            self.keyboard.window_modifier = pressed;
            debug!("Window modifier {}", if pressed { "armed" } else { "released" });
        }

        if keysym == KEY_ALT_L && !pressed {
            if let Some(index) = self.keyboard.finish_switch() {
                if let Some(id) = self.registry.order().get(index).copied() {
                    self.registry.focus(id, &mut self.backend, &self.style);
                }
            }
        }

        if pressed && keysym == KEY_TAB && self.keyboard.alt_held() {
            let len = self.registry.order().len();
            if let Some(index) = self.keyboard.advance_switch(len) {
                debug!("Window switch at {}", index);
            }
            return;
        }

        if pressed && self.keyboard.super_held() {
            if let Some(action) = self.key_bindings.lookup(keysym).cloned() {
                self.run_action(action);
                return;
            }
        }

        self.backend.forward_key(keycode, pressed);
    }

    fn run_action(&mut self, action: KeyAction) {
        debug!("Key action {:?}", action);
        let focused = self.registry.focused();

        match action {
            KeyAction::Quit => {
                info!("Quit requested");
                self.running = false;
            }
            KeyAction::Minimize => {
                if let Some(id) = focused {
                    self.minimize(id);
                }
            }
            KeyAction::ToggleMaximize => {
                if let Some(id) = focused {
                    self.toggle_maximize(id);
                }
            }
            KeyAction::ToggleFullscreen => {
                if let Some(id) = focused {
                    self.toggle_fullscreen(id);
                }
            }
            KeyAction::CloseWindow => {
                if let Some(window) = focused.and_then(|id| self.registry.get(id)) {
                    self.backend.send_close(window.surface);
                }
            }
            KeyAction::Spawn(command) => self.spawn_shell(&command),
        }
    }
}

impl Compositor<HeadlessBackend> {
    /// Let the headless scene follow the event, then handle it
    pub fn dispatch(&mut self, event: BackendEvent) {
        self.backend.observe(&event);
        self.handle_event(event);
    }
}
