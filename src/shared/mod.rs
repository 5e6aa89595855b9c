//! Shared value types used across the compositor

pub mod window_state;

pub use window_state::{Geometry, Point, WindowId, WindowKind, WindowState};
