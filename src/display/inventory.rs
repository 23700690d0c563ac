//! Display Inventory Reader
//!
//! Parses xrandr's text reports into [`TopologySnapshot`] records. This is the
//! only place raw utility output is handled.
//!
//! # Report format
//!
//! ```text
//! Screen 0: minimum 320 x 200, current 3840 x 1080, maximum 16384 x 16384
//! eDP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 344mm x 194mm
//!    1920x1080     60.01*+  59.97
//!    1280x720      60.00
//! HDMI-1 connected 1920x1080+1920+0 (normal left inverted right x axis y axis) 527mm x 296mm
//!    1920x1080     60.00*+
//! DP-1 disconnected (normal left inverted right x axis y axis)
//! ```
//!
//! Header lines start at column 0; candidate mode lines are indented and the
//! active one carries `*`. The verbose report repeats the headers with the
//! current rotation as a bare keyword; the parenthesised capability list
//! must be stripped first because it names every supported rotation.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::display::backend::DisplayBackend;
use crate::display::types::{DisplayOutput, Orientation, Position, Resolution, TopologySnapshot};
use crate::display::{DisplayError, Result};

/// Reads and parses the output inventory through a backend
#[derive(Clone)]
pub struct InventoryReader {
    backend: Arc<dyn DisplayBackend>,
}

impl InventoryReader {
    /// Create a reader over the given backend
    pub fn new(backend: Arc<dyn DisplayBackend>) -> Self {
        Self { backend }
    }

    /// Read a fresh snapshot
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::QueryFailed`] if either report cannot be
    /// obtained. Nothing is partially applied; callers keep their previous
    /// snapshot.
    pub async fn read(&self) -> Result<TopologySnapshot> {
        let report = self.backend.list_outputs().await?;
        let verbose = self.backend.list_outputs_verbose().await?;

        let mut outputs = parse_outputs(&report);
        let orientations = parse_orientations(&verbose);

        for output in &mut outputs {
            if let Some(orientation) = orientations.get(&output.name) {
                output.orientation = *orientation;
            }
        }

        let snapshot = build_snapshot(outputs);
        debug!(
            "Inventory: primary={:?}, secondary={:?}",
            snapshot.primary, snapshot.secondary
        );
        Ok(snapshot)
    }

    /// Name of the primary output
    pub async fn main_display(&self) -> Result<Option<String>> {
        Ok(self.read().await?.primary)
    }

    /// Connected outputs other than `main`, in report order
    pub async fn external_displays(&self, main: &str) -> Result<Vec<String>> {
        let snapshot = self.read().await?;
        Ok(snapshot
            .outputs
            .iter()
            .filter(|o| o.connected && o.name != main)
            .map(|o| o.name.clone())
            .collect())
    }

    /// Candidate modes of `display` as `WIDTHxHEIGHT` strings
    pub async fn available_resolutions(&self, display: &str) -> Result<Vec<String>> {
        let snapshot = self.read().await?;
        Ok(snapshot
            .output(display)
            .map(|o| o.available_resolutions.iter().map(ToString::to_string).collect())
            .unwrap_or_default())
    }

    /// Active mode of `display`
    pub async fn current_mode(&self, display: &str) -> Result<Option<Resolution>> {
        let snapshot = self.read().await?;
        Ok(snapshot.output(display).and_then(|o| o.current_mode))
    }
}

/// Assemble a snapshot, choosing the primary
///
/// The explicitly marked primary wins. Without one, the first connected
/// output in report order is treated as primary.
pub fn build_snapshot(outputs: Vec<DisplayOutput>) -> TopologySnapshot {
    let primary = outputs
        .iter()
        .find(|o| o.connected && o.primary)
        .or_else(|| outputs.iter().find(|o| o.connected))
        .map(|o| o.name.clone());

    let secondary = outputs
        .iter()
        .filter(|o| o.connected && Some(&o.name) != primary.as_ref())
        .map(|o| o.name.clone())
        .collect();

    TopologySnapshot {
        primary,
        secondary,
        outputs,
    }
}

/// Parse a plain `--query` report
pub fn parse_outputs(report: &str) -> Vec<DisplayOutput> {
    let mut outputs: Vec<DisplayOutput> = Vec::new();
    // Block the indented mode lines belong to; any column-0 line closes it
    let mut current_block: Option<usize> = None;

    for line in report.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            current_block = match parse_header(line) {
                Ok(Some(output)) => {
                    outputs.push(output);
                    Some(outputs.len() - 1)
                }
                Ok(None) => None,
                Err(e) => {
                    trace!("Skipping header: {}", e);
                    None
                }
            };
            continue;
        }

        let Some(current) = current_block.and_then(|i| outputs.get_mut(i)) else {
            continue;
        };

        match parse_mode_line(line) {
            Ok((resolution, active)) => {
                if !current.available_resolutions.contains(&resolution) {
                    current.available_resolutions.push(resolution);
                }
                if active && current.current_mode.is_none() {
                    current.current_mode = Some(resolution);
                }
            }
            Err(e) => trace!("Skipping mode line for {}: {}", current.name, e),
        }
    }

    for output in &mut outputs {
        if output.resolution.is_none() {
            output.resolution = output.current_mode;
        }
    }

    outputs
}

/// Parse the verbose report into per-output orientation
///
/// Headers without a rotation keyword default to [`Orientation::Normal`].
pub fn parse_orientations(verbose: &str) -> HashMap<String, Orientation> {
    verbose
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let name = tokens.next()?;
            let state = tokens.next()?;
            if state != "connected" && state != "disconnected" {
                return None;
            }
            let orientation = orientation_keyword(line).unwrap_or_else(|e| {
                trace!("{}", e);
                Orientation::Normal
            });
            Some((name.to_string(), orientation))
        })
        .collect()
}

/// Parse one output header line
///
/// Returns `Ok(None)` for lines that are not output headers (e.g. `Screen 0:`).
fn parse_header(line: &str) -> Result<Option<DisplayOutput>> {
    let mut tokens = line.split_whitespace();
    let (Some(name), Some(state)) = (tokens.next(), tokens.next()) else {
        return Ok(None);
    };

    let connected = match state {
        "connected" => true,
        "disconnected" => false,
        _ => return Ok(None),
    };

    let mut output = DisplayOutput::new(name);
    output.connected = connected;

    // Only the part before the capability list carries markers
    let head = line.split('(').next().unwrap_or(line);
    for token in head.split_whitespace().skip(2) {
        if token == "primary" {
            output.primary = true;
        } else if token.contains('x') && token.contains('+') {
            match parse_geometry(token) {
                Ok((resolution, position)) => {
                    output.resolution = Some(resolution);
                    output.position = position;
                }
                Err(e) => trace!("{}: {}", name, e),
            }
        }
    }

    if let Ok(orientation) = orientation_keyword(line) {
        output.orientation = orientation;
    }

    Ok(Some(output))
}

/// Parse `WIDTHxHEIGHT+X+Y`
fn parse_geometry(token: &str) -> Result<(Resolution, Position)> {
    let ambiguous = || DisplayError::ParseAmbiguous(format!("bad geometry: {token}"));

    let (size, offsets) = token.split_once('+').ok_or_else(ambiguous)?;
    let resolution: Resolution = size.parse().map_err(|_| ambiguous())?;

    let (x, y) = offsets.split_once('+').ok_or_else(ambiguous)?;
    let x: i32 = x.parse().map_err(|_| ambiguous())?;
    let y: i32 = y.parse().map_err(|_| ambiguous())?;

    Ok((resolution, Position::new(x, y)))
}

/// Parse an indented candidate mode line, returning the mode and whether it
/// is active
fn parse_mode_line(line: &str) -> Result<(Resolution, bool)> {
    let mut tokens = line.split_whitespace();
    let first = tokens
        .next()
        .ok_or_else(|| DisplayError::ParseAmbiguous("empty mode line".into()))?;
    let resolution: Resolution = first.parse()?;
    let active = tokens.any(|t| t.contains('*'));
    Ok((resolution, active))
}

/// Rotation keyword of a header line, ignoring parenthesised segments and
/// the output name
fn orientation_keyword(line: &str) -> Result<Orientation> {
    let stripped = strip_parenthesized(line);
    let tokens: Vec<&str> = stripped.split_whitespace().skip(1).collect();

    for (keyword, orientation) in [
        ("right", Orientation::Right),
        ("left", Orientation::Left),
        ("inverted", Orientation::Inverted),
        ("normal", Orientation::Normal),
    ] {
        if tokens.contains(&keyword) {
            return Ok(orientation);
        }
    }

    Err(DisplayError::ParseAmbiguous(format!(
        "no rotation keyword in: {}",
        line.trim()
    )))
}

/// Remove every `( ... )` segment
fn strip_parenthesized(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;

    for c in line.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out
}
