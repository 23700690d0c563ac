//! System Diagnostics
//!
//! Startup diagnostics for debugging display problems: host information,
//! the graphical session the tool runs in, and the xrandr it will drive.

use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DisplayConfig;

/// System information for diagnostics
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system name (e.g., "Linux", "Ubuntu")
    pub os_name: String,
    /// Operating system version string
    pub os_version: String,

    /// Kernel version string
    pub kernel_version: String,

    /// System hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Gather system information
    pub fn gather() -> Self {
        Self {
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Log system information
    pub fn log(&self) {
        info!("=== System Information ===");
        info!("  OS: {} {}", self.os_name, self.os_version);
        info!("  Kernel: {}", self.kernel_version);
        info!("  Hostname: {}", self.hostname);
    }
}

/// Graphical session the process runs in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// `XDG_SESSION_TYPE` ("x11", "wayland", ...)
    pub session_type: Option<String>,

    /// `DISPLAY`
    pub display: Option<String>,

    /// `XDG_CURRENT_DESKTOP`
    pub desktop: Option<String>,
}

impl SessionInfo {
    /// Read the session from the environment
    pub fn detect() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v: &String| !v.is_empty());
        Self {
            session_type: var("XDG_SESSION_TYPE"),
            display: var("DISPLAY"),
            desktop: var("XDG_CURRENT_DESKTOP"),
        }
    }

    /// Whether xrandr can be expected to reconfigure outputs
    pub fn is_x11(&self) -> bool {
        match self.session_type.as_deref() {
            Some(kind) => kind.eq_ignore_ascii_case("x11"),
            None => self.display.is_some(),
        }
    }
}

/// Get the xrandr version line
///
/// Bounded by `timeout` like every other xrandr invocation; a hung or
/// missing binary yields `None`.
pub async fn get_xrandr_version(program: &str, timeout: Duration) -> Option<String> {
    let mut command = Command::new(program);
    command.arg("--version").kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("Failed to run {} --version: {}", program, e);
            return None;
        }
        Err(_) => {
            warn!("{} --version did not finish within {:?}", program, timeout);
            return None;
        }
    };

    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout)
        .ok()
        .and_then(|s| s.lines().next().map(|line| line.trim().to_string()))
}

/// Log complete diagnostics on startup
pub async fn log_startup_diagnostics(config: &DisplayConfig) {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║          Startup Diagnostics                              ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    SystemInfo::gather().log();

    let session = SessionInfo::detect();
    info!("=== Session ===");
    info!(
        "  Type: {}",
        session.session_type.as_deref().unwrap_or("Unknown")
    );
    info!("  DISPLAY: {}", session.display.as_deref().unwrap_or("(unset)"));
    info!("  Desktop: {}", session.desktop.as_deref().unwrap_or("Unknown"));
    if !session.is_x11() {
        warn!("Not an X11 session; xrandr changes may have no effect");
    }

    info!("=== Display Utility ===");
    match get_xrandr_version(&config.xrandr_path, config.command_timeout()).await {
        Some(version) => info!("  {}: {}", config.xrandr_path, version),
        None => warn!("  {}: not found or not runnable", config.xrandr_path),
    }
    info!("  Command timeout: {:?}", config.command_timeout());
    info!("  Poll interval: {:?}", config.poll_interval());
    info!("  Revert timeout: {}s", config.revert_timeout_secs);

    info!("=== Build ===");
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));
    #[cfg(debug_assertions)]
    info!("  Build: debug");
    #[cfg(not(debug_assertions))]
    info!("  Build: release");
}
