//! Surface routing
//!
//! Maps backend surfaces to the windows that own them. Each window holds a
//! [`SurfaceBinding`]; dropping the window drops the route, so events that
//! arrive for a surface after its window is gone find nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::debug;

use super::SurfaceKey;
use crate::shared::WindowId;

type RouteTable = HashMap<SurfaceKey, WindowId>;

/// Routing table from surfaces to windows
#[derive(Debug, Default)]
pub struct SurfaceBindings {
    routes: Rc<RefCell<RouteTable>>,
}

impl SurfaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route events for `surface` to `window` for as long as the returned
    /// guard lives
    #[must_use = "the route is removed as soon as the binding is dropped"]
    pub fn bind(&self, surface: SurfaceKey, window: WindowId) -> SurfaceBinding {
        if let Some(previous) = self.routes.borrow_mut().insert(surface, window) {
            debug!("Surface {:?} rebound from window {} to {}", surface, previous, window);
        }
        SurfaceBinding {
            routes: Rc::downgrade(&self.routes),
            surface,
            window,
        }
    }

    pub fn lookup(&self, surface: SurfaceKey) -> Option<WindowId> {
        self.routes.borrow().get(&surface).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.routes.borrow().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Live route of one surface; removes itself on drop
#[derive(Debug)]
pub struct SurfaceBinding {
    routes: Weak<RefCell<RouteTable>>,
    surface: SurfaceKey,
    window: WindowId,
}

impl SurfaceBinding {
    pub fn surface(&self) -> SurfaceKey {
        self.surface
    }
}

impl Drop for SurfaceBinding {
    fn drop(&mut self) {
        let Some(routes) = self.routes.upgrade() else {
            return;
        };
        let mut routes = routes.borrow_mut();
        // Only drop the route if it still points at this window
        if routes.get(&self.surface) == Some(&self.window) {
            routes.remove(&self.surface);
        }
    }
}
