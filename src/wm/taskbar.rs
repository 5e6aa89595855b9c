//! Taskbar link
//!
//! Compositor side of the notification channel: publishes window lifecycle
//! records, polls for taskbar requests and tracks the taskbar's own surface.

use std::collections::VecDeque;
use tracing::{debug, warn};

use kestrel_ipc::{Action, Record, SharedChannel, TASKBAR_CLIENT};

use crate::backend::SurfaceKey;
use crate::shared::WindowId;
use crate::wm::window::Window;

/// Taskbar request decoded from the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskbarRequest {
    Focus(WindowId),
    Unfocus(WindowId),
    Minimize(WindowId),
}

#[derive(Debug)]
pub struct TaskbarLink {
    channel: SharedChannel,

    /// The taskbar's own toplevel, once it showed up
    pub surface: Option<SurfaceKey>,

    /// The taskbar process was started
    pub launched: bool,

    /// Records waiting for a frame tick; the slot holds one at a time
    pending: VecDeque<Action>,
}

/// ADD_WINDOW record for a managed window
pub fn add_window_action(window: &Window) -> Action {
    Action::AddWindow {
        window_id: window.id.0,
        app_id: window.app_id_or_default().to_string(),
        title: window.title_or_default().to_string(),
    }
}

impl TaskbarLink {
    pub fn new(channel: SharedChannel) -> Self {
        Self {
            channel,
            surface: None,
            launched: false,
            pending: VecDeque::new(),
        }
    }

    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    pub fn is_taskbar_surface(&self, surface: SurfaceKey) -> bool {
        self.surface == Some(surface)
    }

    /// Publish a record, or queue it behind a replay still in progress
    pub fn publish(&mut self, action: Action) {
        if self.pending.is_empty() {
            self.write(action);
        } else {
            self.pending.push_back(action);
        }
    }

    /// Queue `actions` and write the first one now; the rest go out one per
    /// [`flush`](Self::flush)
    pub fn replay(&mut self, actions: impl IntoIterator<Item = Action>) {
        self.pending.extend(actions);
        self.flush();
    }

    /// Write the next queued record. Returns false when nothing was queued.
    pub fn flush(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(action) => {
                self.write(action);
                true
            }
            None => false,
        }
    }

    /// Oversized or failed writes are logged and dropped
    fn write(&mut self, action: Action) {
        let record = Record::from_compositor(action);
        match self.channel.publish(&record) {
            Ok(seq) => debug!("Published {:?} (seq {})", record.action, seq),
            Err(e) => warn!("Failed to publish {:?}: {}", record.action, e),
        }
    }

    pub fn window_added(&mut self, window: &Window) {
        self.publish(add_window_action(window));
    }

    pub fn window_removed(&mut self, id: WindowId) {
        self.publish(Action::RemoveWindow { window_id: id.0 });
    }

    pub fn output_configured(&mut self, width: i32, height: i32) {
        self.publish(Action::ConfigureEshybar { width, height });
    }

    /// Taskbar request waiting in the channel, if any
    pub fn poll(&mut self) -> Option<TaskbarRequest> {
        let record = self.channel.poll()?;
        if !record.is_from(TASKBAR_CLIENT) {
            debug!("Ignoring record from {:?}", record.sender_client);
            return None;
        }

        match record.action {
            Action::FocusWindow { window_id } => Some(TaskbarRequest::Focus(WindowId(window_id))),
            Action::UnfocusWindow { window_id } => Some(TaskbarRequest::Unfocus(WindowId(window_id))),
            Action::MinimizeWindow { window_id } => Some(TaskbarRequest::Minimize(WindowId(window_id))),
            other => {
                debug!("Ignoring taskbar record {:?}", other);
                None
            }
        }
    }
}
