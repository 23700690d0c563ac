//! # lamco-display-ctl
//!
//! Display layout and orientation control for X11 desktops.
//!
//! Detects the primary and secondary outputs, classifies where each
//! secondary sits relative to the primary, applies position, resolution and
//! orientation changes through xrandr, protects orientation changes with a
//! timed auto-revert, and keeps the layout consistent as monitors are
//! plugged and unplugged.
//!
//! # Architecture
//!
//! ```text
//! lamco-display-ctl
//!   ├─> Config (TOML + CLI overrides)
//!   ├─> DisplaySession (single task, owns all display state)
//!   │     ├─> InventoryReader   (xrandr --query / --verbose parsing)
//!   │     ├─> classify          (relative placement)
//!   │     ├─> LayoutApplier     (auto → position → mode → orientation)
//!   │     ├─> OrientationGuard  (10s confirm-or-revert)
//!   │     └─> HotplugReconciler (2s poll)
//!   └─> XrandrBackend (bounded-time process invocations)
//! ```
//!
//! # Data Flow
//!
//! **Query Path:** xrandr → InventoryReader → TopologySnapshot → observer
//!
//! **Command Path:** LayoutRequest → LayoutApplier → OutputCommand → xrandr

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Application configuration
pub mod config;

/// Display topology, layout and orientation management
pub mod display;

/// Utility functions
pub mod utils;

pub use config::Config;
pub use display::{DisplayError, DisplaySession, SessionHandle};
