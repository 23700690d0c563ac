//! Utility Functions and Diagnostics
//!
//! System diagnostics and user-friendly error formatting.
//!
//! # Overview
//!
//! 1. **Diagnostics** - Host, session and display utility detection
//! 2. **Error Formatting** - User-friendly error messages with troubleshooting hints
//!
//! ## Diagnostics
//!
//! ```no_run
//! use lamco_display_ctl::utils::{SessionInfo, SystemInfo};
//!
//! let sys_info = SystemInfo::gather();
//! sys_info.log(); // Logs: OS, kernel, hostname
//!
//! let session = SessionInfo::detect();
//! if !session.is_x11() {
//!     eprintln!("xrandr needs an X11 session");
//! }
//! ```
//!
//! ## Error Formatting
//!
//! ```no_run
//! use lamco_display_ctl::utils::format_user_error;
//!
//! # fn operation() -> anyhow::Result<()> { Ok(()) }
//! if let Err(e) = operation() {
//!     // Box-drawn message, troubleshooting steps, technical details
//!     eprintln!("{}", format_user_error(&e));
//! }
//! ```
//!
//! Error categories with context-aware help:
//! - xrandr missing → package names, PATH, `xrandr_path`
//! - X display unreachable → `DISPLAY`, Wayland sessions, X permissions
//! - No primary → cabling, headless servers
//! - Rejected change → unsupported modes, screen size limits
//! - Config errors → location, syntax, valid values

pub mod diagnostics;
pub mod errors;

pub use diagnostics::{get_xrandr_version, log_startup_diagnostics, SessionInfo, SystemInfo};
pub use errors::format_user_error;
