//! Display Topology Management
//!
//! Detects connected outputs, classifies their position relative to the
//! primary, applies layout changes, guards orientation changes behind a
//! timed auto-revert, and reconciles against hotplug events.
//!
//! # Overview
//!
//! Everything goes through a command/query boundary ([`DisplayBackend`]) to
//! an external display-configuration utility (xrandr). Its text report is the
//! only source of truth and is parsed into typed records at one place
//! ([`inventory`]).
//!
//! ```text
//! DisplaySession (owns all mutable state, one task)
//!   ├─> HotplugReconciler ──> InventoryReader ──> DisplayBackend::list_outputs
//!   ├─> classify (pure)
//!   ├─> LayoutApplier ──────> DisplayBackend::execute
//!   └─> OrientationGuard ───> DisplayBackend::execute (rotate / revert)
//! ```
//!
//! # Orientation Guard
//!
//! A rotated display may leave the user unable to read a confirmation
//! dialog. Any orientation other than the confirmed one starts a 10 second
//! countdown; without a confirm the output is rotated back:
//!
//! ```text
//!            request(o != baseline)
//!   (idle) ───────────────────────> running(10)
//!                                     │  tick ×10
//!          confirm                    ▼
//!   confirmed <──── running(n) ───> reverted
//!                       │ new request
//!                       ▼
//!                   superseded
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lamco_display_ctl::config::Config;
//! use lamco_display_ctl::display::{DisplaySession, NullObserver, XrandrBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default_config()?;
//! let backend = Arc::new(XrandrBackend::from_config(&config.display));
//! let session = DisplaySession::start(backend, &config.display, Arc::new(NullObserver)).await?;
//!
//! println!("Primary: {}", session.main_display());
//! let (handle, session_loop) = session.into_runner();
//! # drop(handle);
//! session_loop.await?;
//! # Ok(())
//! # }
//! ```

mod applier;
mod backend;
mod guard;
pub mod inventory;
mod reconciler;
mod session;
mod topology;
mod types;

pub use applier::{ApplyOutcome, LayoutApplier};
pub use backend::{DisplayBackend, ModeSelection, OutputCommand, PowerState, XrandrBackend};
pub use guard::{
    GuardTick, OrientationGuard, OrientationTimer, RequestOutcome, TimerStatus,
    DEFAULT_REVERT_SECONDS,
};
pub use inventory::InventoryReader;
pub use reconciler::{HotplugReconciler, ReconcileOutcome, DEFAULT_POLL_INTERVAL};
pub use session::{
    DisplaySession, Notification, NullObserver, SessionHandle, SessionObserver,
};
pub use topology::classify;
pub use types::{
    DesiredLayoutState, DisplayOutput, LayoutBaseline, LayoutRequest, Orientation, Position,
    RelativePosition, Resolution, TopologySnapshot,
};

use thiserror::Error;

/// Display management result type
pub type Result<T> = std::result::Result<T, DisplayError>;

/// Display management error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    /// Inventory read could not complete; callers keep their last snapshot
    #[error("Display query failed: {0}")]
    QueryFailed(String),

    /// A report line could not be classified; defaulted by the reader
    #[error("Ambiguous display report: {0}")]
    ParseAmbiguous(String),

    /// A mutating command failed or timed out
    #[error("Failed to {action} on {output}: {message}")]
    CommandFailed {
        /// Human-readable action (e.g. "rotate to left")
        action: String,
        /// Target output
        output: String,
        /// Utility stderr or failure reason
        message: String,
    },

    /// No output is marked primary and none is connected
    #[error("No primary display detected")]
    NoPrimaryDetected,

    /// Confirm requested with no countdown running
    #[error("No orientation change is awaiting confirmation")]
    NoPendingOrientation,

    /// Request names an output or value that cannot be applied
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The session loop has stopped
    #[error("Display session closed")]
    SessionClosed,
}

impl DisplayError {
    /// Output this error is about, when there is one
    pub fn output(&self) -> Option<&str> {
        match self {
            DisplayError::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}
