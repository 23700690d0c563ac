//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

use crate::display::DisplayError;

/// Error categories with dedicated troubleshooting text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    UtilityMissing,
    NoDisplay,
    NoPrimary,
    CommandFailed,
    Config,
    Generic,
}

fn classify_error(error: &anyhow::Error) -> ErrorKind {
    if let Some(display_error) = error.chain().find_map(|e| e.downcast_ref::<DisplayError>()) {
        match display_error {
            DisplayError::NoPrimaryDetected => return ErrorKind::NoPrimary,
            DisplayError::CommandFailed { .. } => return ErrorKind::CommandFailed,
            _ => {}
        }
    }

    let error_msg = format!("{:#}", error);

    if error_msg.contains("Can't open display") || error_msg.contains("cannot open display") {
        ErrorKind::NoDisplay
    } else if error_msg.contains("failed to run") || error_msg.contains("No such file") {
        ErrorKind::UtilityMissing
    } else if error_msg.contains("config") {
        ErrorKind::Config
    } else {
        ErrorKind::Generic
    }
}

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    match classify_error(error) {
        ErrorKind::UtilityMissing => format_utility_error(&mut output),
        ErrorKind::NoDisplay => format_display_error(&mut output),
        ErrorKind::NoPrimary => format_primary_error(&mut output),
        ErrorKind::CommandFailed => format_command_error(&mut output),
        ErrorKind::Config => format_config_error(&mut output),
        ErrorKind::Generic => format_generic_error(&mut output, &error.to_string()),
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-display-ctl -vv status"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Check what xrandr reports: xrandr --query"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_utility_error(output: &mut String) {
    writeln!(output, "Display Utility Not Available").ok();
    writeln!(output).ok();
    writeln!(output, "Could not run the display-configuration utility (xrandr).").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. xrandr is not installed").ok();
    writeln!(output, "     → Debian/Ubuntu: sudo apt install x11-xserver-utils").ok();
    writeln!(output, "     → Fedora: sudo dnf install xrandr").ok();
    writeln!(output, "     → Arch: sudo pacman -S xorg-xrandr").ok();
    writeln!(output).ok();
    writeln!(output, "  2. xrandr is not on PATH").ok();
    writeln!(output, "     → Check: command -v xrandr").ok();
    writeln!(output, "     → Or set xrandr_path in config.toml").ok();
    writeln!(output, "     → Or pass: lamco-display-ctl --xrandr /path/to/xrandr").ok();
}

fn format_display_error(output: &mut String) {
    writeln!(output, "X Display Not Reachable").ok();
    writeln!(output).ok();
    writeln!(output, "xrandr could not connect to an X server.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. DISPLAY is not set").ok();
    writeln!(output, "     → Check: echo $DISPLAY (should be like ':0')").ok();
    writeln!(output, "     → Over SSH: export DISPLAY=:0").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Running in a Wayland session").ok();
    writeln!(output, "     → Check: echo $XDG_SESSION_TYPE").ok();
    writeln!(output, "     → XWayland outputs cannot be reconfigured with xrandr").ok();
    writeln!(output).ok();
    writeln!(output, "  3. No permission to access the X server").ok();
    writeln!(output, "     → Check: xhost").ok();
    writeln!(output, "     → Run as the logged-in desktop user").ok();
}

fn format_primary_error(output: &mut String) {
    writeln!(output, "No Display Detected").ok();
    writeln!(output).ok();
    writeln!(output, "xrandr reported no connected output to manage.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Monitor cable unplugged or monitor powered off").ok();
    writeln!(output, "     → Check: xrandr --query | grep ' connected'").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Headless or virtual X server").ok();
    writeln!(output, "     → Xvfb and similar servers may report no outputs").ok();
}

fn format_command_error(output: &mut String) {
    writeln!(output, "Display Change Rejected").ok();
    writeln!(output).ok();
    writeln!(output, "xrandr refused to apply the requested change.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Mode not supported by the output").ok();
    writeln!(output, "     → List modes: lamco-display-ctl status").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Virtual screen too small for the new layout").ok();
    writeln!(output, "     → Check 'maximum' in: xrandr --query | head -1").ok();
    writeln!(output).ok();
    writeln!(output, "  3. The output was unplugged during the change").ok();
    writeln!(output, "     → Re-run after reconnecting the monitor").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Default location: ~/.config/lamco-display-ctl/config.toml"
    )
    .ok();
    writeln!(
        output,
        "     → Or specify: lamco-display-ctl -c /path/to/config.toml"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Invalid values").ok();
    writeln!(output, "     → Intervals and timeouts must be greater than zero").ok();
    writeln!(
        output,
        "     → default_position: right-of, left-of, above, below or same-as"
    )
    .ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Display Control Error").ok();
    writeln!(output).ok();
    writeln!(output, "An error occurred while managing displays.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Verify you're in an X11 session:").ok();
    writeln!(output, "     → echo $XDG_SESSION_TYPE (should be 'x11')").ok();
    writeln!(output, "     → echo $DISPLAY").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Check xrandr works on its own:").ok();
    writeln!(output, "     → xrandr --query").ok();
}
